//! Unified error types for the fieldlink core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! foreground loop's error handling uniform. All variants are `Copy` so they
//! can be passed through the delivery engine and scheduler without
//! allocation. None of these are fatal: frames are dropped, upserts are
//! refused, deliveries are retried on the next pass.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

/// Every fallible operation in the link core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound frame was rejected.
    Frame(FrameError),
    /// A key table operation failed.
    KeyStore(KeyStoreError),
    /// An outbound delivery failed.
    Delivery(DeliveryError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::KeyStore(e) => write!(f, "keystore: {e}"),
            Self::Delivery(e) => write!(f, "delivery: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame decode errors
// ---------------------------------------------------------------------------

/// Why an inbound frame was rejected.
///
/// `Malformed` frames are dropped silently — a garbled frame cannot be
/// attributed to any in-flight request. `UnknownVehicle` and `BadTag` are
/// dropped too, but are worth a log line because they usually mean a missing
/// `CFG:` binding or a key mismatch between the two ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Too short, unknown version byte, or no parseable identifier token.
    Malformed,
    /// The identifier decoded cleanly but has no key binding.
    UnknownVehicle,
    /// A key was found but the integrity tag does not match.
    BadTag,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed frame"),
            Self::UnknownVehicle => write!(f, "unknown vehicle"),
            Self::BadTag => write!(f, "integrity tag mismatch"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Key store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStoreError {
    /// Every slot is occupied and the identifier is not already bound.
    /// Existing bindings keep working; nothing was mutated.
    Full,
    /// Serial-provisioned key material is empty or longer than 16 bytes.
    BadKeyMaterial,
}

impl fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "key table full"),
            Self::BadKeyMaterial => write!(f, "bad key material"),
        }
    }
}

impl From<KeyStoreError> for Error {
    fn from(e: KeyStoreError) -> Self {
        Self::KeyStore(e)
    }
}

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The retry ceiling was reached without a matching acknowledgement.
    /// The sequence number is unchanged; the next scheduling pass restarts
    /// the cycle and the peer deduplicates by sequence.
    Exhausted,
    /// A message or frame would not fit its buffer.
    Overflow,
    /// `begin` was called while a delivery was already in flight.
    Busy,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "retries exhausted"),
            Self::Overflow => write!(f, "buffer overflow"),
            Self::Busy => write!(f, "delivery already in flight"),
        }
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
