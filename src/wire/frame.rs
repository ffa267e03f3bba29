//! Canonical wire frame — version byte plus encrypted body.
//!
//! ```text
//! ┌─────────────┬──────────────────────────────────────────────┐
//! │ Version (1B)│ AES-ECB ciphertext (32 / 64 / 96 B)          │
//! └─────────────┴──────────────────────────────────────────────┘
//!                 body plaintext, before encryption:
//!               ┌──────────────┬───────────────────────────────┐
//!               │ Tag (LE u32) │ padded message text           │
//!               └──────────────┴───────────────────────────────┘
//! ```
//!
//! The body length evolved across protocol revisions (32 → 64 → 96 bytes)
//! with no discriminator on the wire, so the frame now leads with an
//! explicit version byte. The byte travels in the clear, outside the
//! encrypted region, keeping each body bit-identical to its legacy layout;
//! bare legacy bodies are rejected as malformed.
//!
//! Two keys are involved, deliberately asymmetric: one transport-wide
//! cipher key (coarse confidentiality, shared by every node) and one
//! per-vehicle tag key (authenticity). The tag is computed over the padded
//! UNencrypted payload, then encrypted along with it.

use serde::{Deserialize, Serialize};

use super::block;
use super::cipher::{BLOCK_LEN, FrameCipher};
use super::message::{self, MessageBuf, TAG_ACK, TAG_ID, VehicleId};
use super::tag::IntegrityTag;
use crate::error::FrameError;

/// Integrity tag width in the body.
pub const TAG_LEN: usize = 4;

/// Largest wire frame: version byte + six cipher blocks.
pub const MAX_FRAME_LEN: usize = 1 + 96;

/// A complete wire frame, fixed capacity.
pub type FrameBuf = heapless::Vec<u8, MAX_FRAME_LEN>;

// ── Frame revisions ──────────────────────────────────────────

/// On-wire frame revision, carried as the leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameVersion {
    /// Two cipher blocks, 28-byte payload. Earliest revision.
    Compact = 0x01,
    /// Four cipher blocks, 60-byte payload. Used for ACK frames.
    Standard = 0x02,
    /// Six cipher blocks, 92-byte payload. Used for telemetry.
    Extended = 0x03,
}

impl FrameVersion {
    /// Encrypted body length — always a whole number of cipher blocks.
    pub const fn body_len(self) -> usize {
        match self {
            Self::Compact => 32,
            Self::Standard => 64,
            Self::Extended => 96,
        }
    }

    /// Message capacity of this revision's payload region.
    pub const fn payload_len(self) -> usize {
        self.body_len() - TAG_LEN
    }

    /// Total frame length including the version byte.
    pub const fn wire_len(self) -> usize {
        1 + self.body_len()
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Compact),
            0x02 => Some(Self::Standard),
            0x03 => Some(Self::Extended),
            _ => None,
        }
    }
}

// ── Key selection ────────────────────────────────────────────

/// Resolves a vehicle identifier to its 16-byte tag key.
///
/// The command post backs this with its key table; a field node backs it
/// with its single own binding.
pub trait KeyLookup {
    fn key_for(&self, id: &str) -> Option<[u8; 16]>;
}

impl<F> KeyLookup for F
where
    F: Fn(&str) -> Option<[u8; 16]>,
{
    fn key_for(&self, id: &str) -> Option<[u8; 16]> {
        self(id)
    }
}

// ── Decode result ────────────────────────────────────────────

/// A successfully authenticated inbound frame.
///
/// Existence of this value implies the tag verified against the named
/// vehicle's key; there is no unauthenticated variant to misuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub vehicle: VehicleId,
    pub message: MessageBuf,
}

// ── Encode ───────────────────────────────────────────────────

/// Build one wire frame from message text.
///
/// The message is clipped to the revision's payload region (truncation,
/// not error), padded, tagged with `vehicle_key`, and the whole body is
/// encrypted block by block with the shared transport cipher.
pub fn encode(
    msg: &str,
    vehicle_key: &[u8; 16],
    cipher: &impl FrameCipher,
    tagger: &impl IntegrityTag,
    version: FrameVersion,
    pad_byte: u8,
) -> FrameBuf {
    let mut body = [0u8; 96];
    let body_len = version.body_len();

    let (tag_bytes, payload) = body[..body_len].split_at_mut(TAG_LEN);
    block::pad(msg, payload, pad_byte);
    let tag = tagger.compute(payload, vehicle_key);
    tag_bytes.copy_from_slice(&tag.to_le_bytes());

    for chunk in body[..body_len].chunks_exact_mut(BLOCK_LEN) {
        let blk: &mut [u8; BLOCK_LEN] = chunk.try_into().unwrap();
        cipher.encrypt_block(blk);
    }

    let mut out = FrameBuf::new();
    // MAX_FRAME_LEN covers every revision; these cannot fail.
    let _ = out.push(version as u8);
    let _ = out.extend_from_slice(&body[..body_len]);
    out
}

// ── Decode ───────────────────────────────────────────────────

/// Decode and authenticate one inbound frame.
///
/// The vehicle identifier is extracted from the decrypted payload BEFORE
/// tag verification — it selects which per-vehicle key to verify against.
/// ACK frames identify themselves through their `ACK:` token instead of
/// `ID:`.
pub fn decode(
    frame: &[u8],
    cipher: &impl FrameCipher,
    tagger: &impl IntegrityTag,
    keys: &impl KeyLookup,
    pad_byte: u8,
) -> Result<Decoded, FrameError> {
    let (&ver_byte, body) = frame.split_first().ok_or(FrameError::Malformed)?;
    let version = FrameVersion::from_byte(ver_byte).ok_or(FrameError::Malformed)?;
    let body_len = version.body_len();
    if body.len() != body_len {
        return Err(FrameError::Malformed);
    }

    let mut buf = [0u8; 96];
    buf[..body_len].copy_from_slice(body);
    for chunk in buf[..body_len].chunks_exact_mut(BLOCK_LEN) {
        let blk: &mut [u8; BLOCK_LEN] = chunk.try_into().unwrap();
        cipher.decrypt_block(blk);
    }

    let (tag_bytes, payload) = buf[..body_len].split_at(TAG_LEN);
    let wire_tag = u32::from_le_bytes(tag_bytes.try_into().unwrap());

    // The identifier scan runs over the longest valid-UTF-8 prefix, not the
    // whole payload: a corrupted trailing block must still reach tag
    // verification so tampering reports as BadTag, not Malformed. A wrong
    // transport key garbles the identifier region itself and fails here.
    let text = match core::str::from_utf8(payload) {
        Ok(t) => t,
        Err(e) => core::str::from_utf8(&payload[..e.valid_up_to()]).unwrap(),
    };
    let id_token = message::field(text, TAG_ID)
        .or_else(|| message::field(text, TAG_ACK))
        .ok_or(FrameError::Malformed)?;
    let vehicle = VehicleId::parse(id_token).ok_or(FrameError::Malformed)?;

    let key = keys
        .key_for(vehicle.as_str())
        .ok_or(FrameError::UnknownVehicle)?;
    if !tagger.verify(wire_tag, payload, &key) {
        return Err(FrameError::BadTag);
    }

    // Authenticated, so the payload is the sender's padded ASCII text and
    // the unpadded prefix stays on a char boundary.
    let content = block::unpad(payload, pad_byte);
    let content = core::str::from_utf8(content).map_err(|_| FrameError::Malformed)?;
    let mut msg = MessageBuf::new();
    let _ = msg.push_str(content);

    Ok(Decoded {
        vehicle,
        message: msg,
    })
}
