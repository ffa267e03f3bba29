//! Reliable-delivery state machine for one outbound message.
//!
//! ```text
//!  Idle ──begin──▶ AwaitingAck ──matching ACK──▶ Delivered
//!                      │  ▲
//!             deadline │  │ re-send identical frame,
//!                      ▼  │ fresh jitter
//!                   (retry ≤ ceiling) ──ceiling──▶ Exhausted
//! ```
//!
//! The frame is encoded ONCE at `begin`; every retry re-sends the same
//! bytes. On `Delivered` the caller advances the vehicle's sequence and
//! clears its pending-event flag. `Exhausted` is non-fatal: the sequence
//! stays unchanged and the next scheduling pass restarts the whole cycle,
//! letting the peer deduplicate by sequence if an earlier attempt did get
//! through.
//!
//! Waiting is poll-based, not blocking — the foreground loop keeps
//! draining the serial channel between `poll` calls, so an in-flight
//! delivery never starves key updates.

use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::DeliveryError;
use crate::transport::RadioTransport;
use crate::wire::frame::FrameBuf;
use crate::wire::message::VehicleId;

// ── Jitter source ────────────────────────────────────────────

/// xorshift32 — the target has no OS entropy, and jitter only needs to
/// decorrelate retry timing between nodes, not be unpredictable.
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self {
            // Zero is an absorbing state for xorshift.
            state: if seed == 0 { 0x9e37_79b9 } else { seed },
        }
    }

    fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 { 0 } else { self.next() % bound }
    }
}

// ── States ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Nothing in flight.
    Idle,
    /// Frame sent, deadline armed.
    AwaitingAck,
    /// Matching ACK received; caller advances the ledger.
    Delivered,
    /// Retry ceiling hit; caller reports and retries next pass.
    Exhausted,
}

/// What one `poll` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Nothing in flight.
    Idle,
    /// Deadline not reached yet.
    Waiting,
    /// Deadline passed; the identical frame was re-sent.
    Resent,
    /// Retry ceiling reached; delivery failed for this cycle.
    Exhausted { vehicle: VehicleId, seq: u16 },
}

struct Inflight {
    frame: FrameBuf,
    vehicle: VehicleId,
    seq: u16,
    /// Sends so far, the initial transmission included.
    attempts: u8,
    deadline_ms: u64,
}

// ── Engine ───────────────────────────────────────────────────

/// Drives one outbound message at a time through send/ack/retry.
pub struct DeliveryEngine {
    ack_timeout_ms: u32,
    jitter_max_ms: u32,
    max_attempts: u8,
    rng: XorShift32,
    state: DeliveryState,
    inflight: Option<Inflight>,
}

impl DeliveryEngine {
    pub fn new(cfg: &LinkConfig, jitter_seed: u32) -> Self {
        Self {
            ack_timeout_ms: cfg.ack_timeout_ms,
            jitter_max_ms: cfg.jitter_max_ms,
            max_attempts: cfg.max_attempts,
            rng: XorShift32::new(jitter_seed),
            state: DeliveryState::Idle,
            inflight: None,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// True while a delivery cycle is awaiting its ACK.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, DeliveryState::AwaitingAck)
    }

    /// Identity of the outstanding request, if any.
    pub fn outstanding(&self) -> Option<(&VehicleId, u16)> {
        self.inflight.as_ref().map(|i| (&i.vehicle, i.seq))
    }

    /// Transmit `frame` and arm the ACK deadline. The frame must already
    /// embed `seq`; it is stored verbatim for retransmission.
    pub fn begin<R: RadioTransport>(
        &mut self,
        frame: FrameBuf,
        vehicle: VehicleId,
        seq: u16,
        radio: &mut R,
        now_ms: u64,
    ) -> Result<(), DeliveryError> {
        if self.is_busy() {
            return Err(DeliveryError::Busy);
        }
        debug!("delivery: {vehicle} seq {seq} attempt 1/{}", self.max_attempts);
        self.transmit(radio, &frame);
        let deadline_ms = self.arm_deadline(now_ms);
        self.inflight = Some(Inflight {
            frame,
            vehicle,
            seq,
            attempts: 1,
            deadline_ms,
        });
        self.state = DeliveryState::AwaitingAck;
        Ok(())
    }

    /// Offer a decoded, authenticated ACK. Consumes the in-flight request
    /// only when BOTH the vehicle identifier and the sequence match; any
    /// other ACK is ignored so it can never be bound to the wrong request.
    pub fn offer_ack(&mut self, vehicle: &str, seq: u16) -> bool {
        let Some(inflight) = &self.inflight else {
            return false;
        };
        if inflight.vehicle.as_str() != vehicle || inflight.seq != seq {
            debug!("delivery: ignoring unrelated ACK {vehicle} seq {seq}");
            return false;
        }
        info!("delivery: {vehicle} seq {seq} acknowledged");
        self.inflight = None;
        self.state = DeliveryState::Delivered;
        true
    }

    /// Advance the state machine: retransmit past the deadline, give up
    /// past the ceiling. Call from the foreground loop between serial
    /// drains.
    pub fn poll<R: RadioTransport>(&mut self, now_ms: u64, radio: &mut R) -> PollStep {
        let Some(mut inflight) = self.inflight.take() else {
            return PollStep::Idle;
        };

        if now_ms < inflight.deadline_ms {
            self.inflight = Some(inflight);
            return PollStep::Waiting;
        }

        if inflight.attempts >= self.max_attempts {
            warn!(
                "delivery: {} seq {} exhausted after {} attempts",
                inflight.vehicle, inflight.seq, inflight.attempts
            );
            self.state = DeliveryState::Exhausted;
            return PollStep::Exhausted {
                vehicle: inflight.vehicle,
                seq: inflight.seq,
            };
        }

        inflight.attempts += 1;
        debug!(
            "delivery: {} seq {} attempt {}/{}",
            inflight.vehicle, inflight.seq, inflight.attempts, self.max_attempts
        );
        inflight.deadline_ms = self.arm_deadline(now_ms);
        self.transmit(radio, &inflight.frame);
        self.inflight = Some(inflight);
        PollStep::Resent
    }

    fn arm_deadline(&mut self, now_ms: u64) -> u64 {
        now_ms + u64::from(self.ack_timeout_ms) + u64::from(self.rng.below(self.jitter_max_ms))
    }

    fn transmit<R: RadioTransport>(&mut self, radio: &mut R, frame: &FrameBuf) {
        // A transmit failure is indistinguishable from a lost datagram;
        // the retry path covers both.
        if let Err(e) = radio.send(frame) {
            warn!("delivery: radio send failed: {e:?}");
        }
    }
}
