//! fieldlink — secure framing and reliable delivery core for the vehicle
//! radio link.
//!
//! Links battery-powered vehicle nodes to a command post over an
//! unreliable, shared-medium, short-range radio: fixed-size encrypted
//! frames, a keyed integrity tag with per-vehicle keys, and an
//! ACK/retry delivery cycle with bounded backoff. Sensor sampling,
//! display rendering and serial hardware live outside this crate and
//! reach it through the transport, mailbox and serial-line boundaries.

#![deny(unused_must_use)]

pub mod config;
pub mod delivery;
pub mod error;
pub mod keystore;
pub mod ledger;
pub mod mailbox;
pub mod node;
pub mod scheduler;
pub mod serial;
pub mod station;
pub mod transport;
pub mod wire;
