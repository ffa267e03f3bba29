//! Message text grammar — semicolon-delimited `Tag:Value` tokens.
//!
//! A message is built by the sender as a run of tokens, e.g.
//!
//! ```text
//! ID:AA100AA;Geo:45.1,4.8;Res:Eau=80;Btn:0;Seq:7;Time:10:00:00;
//! ```
//!
//! Tags never contain `:` or `;`. Receivers scan linearly: unknown tags
//! are ignored, a missing tag yields the caller's default. The tokenizer
//! here replaces ad hoc pointer walks with an iterator of `(tag, value)`
//! pairs and an explicit absent result.

use core::fmt::{self, Write as _};

use crate::error::DeliveryError;

/// Payload capacity of the largest frame revision — no message grows past
/// this, so one buffer type serves every call site.
pub const MAX_MESSAGE: usize = 92;

/// Message text buffer, fixed capacity, no heap.
pub type MessageBuf = heapless::String<MAX_MESSAGE>;

/// Tags shared between both ends of the link.
pub const TAG_ID: &str = "ID";
pub const TAG_ACK: &str = "ACK";
pub const TAG_SEQ: &str = "Seq";

// ── Vehicle identifier ───────────────────────────────────────

/// Maximum identifier length in bytes (observed format: 7-char plate).
pub const MAX_ID_LEN: usize = 8;

/// A vehicle's stable identifier — the natural key into the key table and
/// the fleet ledger. Printable ASCII, never `:` or `;`, compared byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VehicleId(heapless::String<MAX_ID_LEN>);

impl VehicleId {
    /// Validate and wrap an identifier token. Rejects empty, over-long,
    /// or non-printable input and the two delimiter characters.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > MAX_ID_LEN {
            return None;
        }
        if !raw
            .bytes()
            .all(|b| (0x21..=0x7e).contains(&b) && b != b':' && b != b';')
        {
            return None;
        }
        let mut s = heapless::String::new();
        // Length checked above; push cannot fail.
        let _ = s.push_str(raw);
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Tokenizer ────────────────────────────────────────────────

/// Iterator over the `(tag, value)` pairs of a message.
///
/// Segments without a `:` (including the empty segment after a trailing
/// `;`) are skipped, not errors.
pub struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Fields<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (segment, rest) = match self.rest.split_once(';') {
                Some((s, r)) => (s, r),
                None => (self.rest, ""),
            };
            self.rest = rest;
            if let Some((tag, value)) = segment.split_once(':') {
                return Some((tag, value));
            }
        }
        None
    }
}

/// Tokenize a message into `(tag, value)` pairs.
pub fn fields(text: &str) -> Fields<'_> {
    Fields { rest: text }
}

/// Linear scan for the first token with exactly `tag`.
/// `None` means the tag is absent — the caller picks its default.
pub fn field<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    fields(text).find(|(t, _)| *t == tag).map(|(_, v)| v)
}

/// Parse the `Seq` token as the 0..=999 sequence number.
pub fn seq_field(text: &str) -> Option<u16> {
    let n: u16 = field(text, TAG_SEQ)?.parse().ok()?;
    (n < 1000).then_some(n)
}

// ── Builder ──────────────────────────────────────────────────

/// Accumulates `Tag:Value;` tokens into a fixed-capacity message.
#[derive(Default)]
pub struct MessageBuilder {
    buf: MessageBuf,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one token. Fails with [`DeliveryError::Overflow`] when the
    /// message would exceed the largest frame's payload region.
    pub fn push(&mut self, tag: &str, value: impl fmt::Display) -> Result<(), DeliveryError> {
        write!(self.buf, "{tag}:{value};").map_err(|_| DeliveryError::Overflow)
    }

    pub fn finish(self) -> MessageBuf {
        self.buf
    }
}
