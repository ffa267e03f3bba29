//! Fixed-size block padding codec.
//!
//! A frame body is always a whole number of 16-byte cipher blocks, so the
//! variable-length message text is copied into a fixed payload region and
//! the remainder is filled with a pad byte. Observed protocol revisions
//! disagree on the pad byte (space vs zero), so it is a parameter rather
//! than a constant; [`crate::config::LinkConfig::pad_byte`] carries the
//! configured value.

/// Default pad byte — ASCII space, the value the current frame revisions use.
pub const DEFAULT_PAD: u8 = 0x20;

/// Copy `message` into `out`, truncating at the boundary and right-padding
/// the remainder with `pad_byte`.
///
/// Truncation is deliberate: a message longer than the payload region is
/// clipped, not rejected, matching the transmit path's behaviour.
pub fn pad(message: &str, out: &mut [u8], pad_byte: u8) {
    let bytes = message.as_bytes();
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
    for b in &mut out[len..] {
        *b = pad_byte;
    }
}

/// Strip trailing `pad_byte` bytes and return the content prefix.
///
/// Known limitation: content that legitimately ends in the pad byte is
/// clipped here too. The message grammar never ends a token run with a
/// space, so this does not bite in practice.
pub fn unpad(buf: &[u8], pad_byte: u8) -> &[u8] {
    let mut end = buf.len();
    while end > 0 && buf[end - 1] == pad_byte {
        end -= 1;
    }
    &buf[..end]
}
