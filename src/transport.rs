//! Radio transport abstraction — any datagram-oriented channel.
//!
//! The link core sends opaque frames and receives them via the
//! [`RadioMailbox`](crate::mailbox::RadioMailbox); no delivery or ordering
//! guarantee is assumed, and the canonical 97-byte frame is chosen to fit
//! under the underlying link's datagram ceiling.
//!
//! Concrete implementations live with the hardware glue (short-range
//! packet radio on the real units, an in-process loopback in tests and the
//! host sim). The delivery engine and services are generic over
//! `RadioTransport`, so a new radio means zero changes to the protocol
//! logic.

/// Datagram-oriented radio channel.
pub trait RadioTransport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Transmit one frame as a single datagram. Fire-and-forget: a
    /// successful return means "handed to the radio", not "delivered".
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

/// A radio that drops everything. Useful as a placeholder before
/// bring-up and in tests that only exercise the receive path.
pub struct NullRadio;

impl RadioTransport for NullRadio {
    type Error = ();

    fn send(&mut self, _frame: &[u8]) -> Result<(), ()> {
        Ok(())
    }
}
