//! Wire protocol subsystem — everything between message text and radio bytes.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Wire Stack                              │
//! │                                                              │
//! │  message text ──▶ block (pad) ──▶ tag (authenticate) ──┐     │
//! │                                                        ▼     │
//! │                                   cipher (AES-ECB, per block)│
//! │                                                        │     │
//! │  radio datagram ◀── frame (version byte + body) ◀──────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decode runs the stack in reverse, with the twist that the vehicle
//! identifier must be extracted mid-way (after decrypt, before verify)
//! to select the per-vehicle tag key.

pub mod block;
pub mod cipher;
pub mod frame;
pub mod message;
pub mod tag;
