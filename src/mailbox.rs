//! Shared-state crossings between the radio-receive context and the
//! foreground loop.
//!
//! The radio delivers datagrams from an interrupt-like notification
//! context. Only two things ever cross that boundary, each through its own
//! primitive:
//!
//! - **Inbound frames** go through a one-slot, last-write-wins mailbox.
//!   The producer never blocks — if the foreground loop has not consumed
//!   the previous frame yet, it is overwritten and silently lost. That is
//!   the link's contract (a slow consumer drops a datagram, same as the
//!   air does), made explicit here instead of living in a flag plus a
//!   shared buffer.
//! - **Serial lines** go through a bounded channel with a non-blocking
//!   producer that drops on overflow.
//!
//! The key table and fleet ledger never cross the boundary; they are
//! foreground-only and need no locking.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::warn;

use crate::wire::frame::FrameBuf;

/// Maximum serial line length accepted from the peripheral glue.
pub const MAX_LINE: usize = 128;

/// One inbound serial line.
pub type SerialLine = heapless::String<MAX_LINE>;

/// Depth of the serial line queue.
const SERIAL_DEPTH: usize = 8;

// ── Radio mailbox ────────────────────────────────────────────

/// One-slot inbound frame mailbox, single producer (receive notification)
/// and single consumer (foreground loop).
pub struct RadioMailbox {
    slot: Signal<CriticalSectionRawMutex, FrameBuf>,
}

impl RadioMailbox {
    pub const fn new() -> Self {
        Self {
            slot: Signal::new(),
        }
    }

    /// Producer side. Never blocks; overwrites an unconsumed frame.
    pub fn publish(&self, frame: FrameBuf) {
        self.slot.signal(frame);
    }

    /// Consumer side, non-blocking.
    pub fn take(&self) -> Option<FrameBuf> {
        self.slot.try_take()
    }

    /// True when a frame is waiting.
    pub fn has_frame(&self) -> bool {
        self.slot.signaled()
    }
}

impl Default for RadioMailbox {
    fn default() -> Self {
        Self::new()
    }
}

// ── Serial line queue ────────────────────────────────────────

/// Bounded inbound queue for serial lines (`CFG:` bindings, vehicle
/// updates). The producer drops on overflow rather than stalling the
/// notification context.
pub struct SerialQueue {
    ch: Channel<CriticalSectionRawMutex, SerialLine, SERIAL_DEPTH>,
}

impl SerialQueue {
    pub const fn new() -> Self {
        Self { ch: Channel::new() }
    }

    /// Producer side; drops the line (with a warning) when the queue is
    /// full.
    pub fn push(&self, line: SerialLine) {
        if self.ch.try_send(line).is_err() {
            warn!("serial queue full, dropping line");
        }
    }

    /// Consumer side, non-blocking.
    pub fn pop(&self) -> Option<SerialLine> {
        self.ch.try_receive().ok()
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}
