//! Command-post service — the foreground loop's brain on the post side.
//!
//! ```text
//!  serial lines ──▶ ┌───────────────────────────┐ ──▶ EXP: / LOG: lines
//!  (CFG, updates)   │          Station           │
//!  radio mailbox ──▶│ keys · fleet · deliveries  │──▶ radio frames
//!                   └───────────────────────────┘
//! ```
//!
//! The station owns the key table and the fleet ledger outright; both are
//! touched only from here, never from the receive-notification context,
//! so they need no locking. Inbound telemetry is authenticated, merged
//! into the ledger, exported as an `EXP:` line and acknowledged. Outbound
//! commands (queued by serial update lines) are delivered one at a time
//! per round-robin pass through the delivery engine.

use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::delivery::{DeliveryEngine, PollStep};
use crate::error::FrameError;
use crate::keystore::KeyStore;
use crate::ledger::Fleet;
use crate::mailbox::{RadioMailbox, SerialQueue};
use crate::scheduler::{RoundRobin, pass_delay_ms};
use crate::serial::{self, LineSink, SerialInput};
use crate::transport::RadioTransport;
use crate::wire::cipher::Aes128Ecb;
use crate::wire::frame;
use crate::wire::message::{self, MessageBuf, TAG_ACK, TAG_SEQ};
use crate::wire::tag::Mix32;

/// Command-post link service over `N` fleet slots.
pub struct Station<const N: usize> {
    cfg: LinkConfig,
    cipher: Aes128Ecb,
    tagger: Mix32,
    keys: KeyStore<N>,
    fleet: Fleet<N>,
    /// Queued outbound command per fleet slot, replaced by newer updates.
    pending: [Option<MessageBuf>; N],
    engine: DeliveryEngine,
    robin: RoundRobin,
    /// Fleet slot of the in-flight delivery, if any.
    inflight_slot: Option<usize>,
}

impl<const N: usize> Station<N> {
    pub fn new(cfg: LinkConfig, transport_key: &[u8; 16], jitter_seed: u32) -> Self {
        Self {
            cipher: Aes128Ecb::new(transport_key),
            tagger: Mix32,
            keys: KeyStore::new(),
            fleet: Fleet::new(),
            pending: core::array::from_fn(|_| None),
            engine: DeliveryEngine::new(&cfg, jitter_seed),
            robin: RoundRobin::new(),
            inflight_slot: None,
            cfg,
        }
    }

    pub fn fleet(&self) -> &Fleet<N> {
        &self.fleet
    }

    pub fn keys(&self) -> &KeyStore<N> {
        &self.keys
    }

    // ── Serial side ──────────────────────────────────────────

    /// Drain every queued serial line. Cheap and non-blocking; called on
    /// every loop iteration so an in-flight delivery cannot starve key
    /// updates.
    pub fn drain_serial(&mut self, queue: &SerialQueue, sink: &mut impl LineSink) {
        while let Some(line) = queue.pop() {
            self.handle_serial_line(&line, sink);
        }
    }

    /// Apply one inbound serial line.
    pub fn handle_serial_line(&mut self, line: &str, sink: &mut impl LineSink) {
        match serial::parse_line(line) {
            SerialInput::BindKey { id, key } => {
                match self.keys.upsert(id.clone(), key) {
                    Ok(()) => {
                        // Reserve the ledger slot alongside the binding so
                        // the scheduler has a place to queue commands.
                        if self.fleet.register(id.clone()).is_none() {
                            warn!("station: fleet full, {id} has a key but no slot");
                        }
                        serial::emit_log(sink, &format!("key bound for {id}"));
                    }
                    Err(e) => {
                        warn!("station: key bind for {id} refused: {e}");
                        serial::emit_log(sink, &format!("key table full, {id} not bound"));
                    }
                }
            }
            SerialInput::VehicleUpdate { id, message } => {
                let Some(slot) = self.fleet.register(id.clone()) else {
                    serial::emit_log(sink, &format!("fleet full, update for {id} dropped"));
                    return;
                };
                debug!("station: queued command for {id} (slot {slot})");
                self.pending[slot] = Some(message);
            }
            SerialInput::Invalid(reason) => {
                serial::emit_log(sink, reason);
            }
            SerialInput::Ignored => {}
        }
    }

    // ── Radio side ───────────────────────────────────────────

    /// Drain the inbound frame mailbox.
    pub fn drain_radio<R: RadioTransport>(
        &mut self,
        mailbox: &RadioMailbox,
        radio: &mut R,
        sink: &mut impl LineSink,
    ) {
        while let Some(raw) = mailbox.take() {
            self.handle_frame(&raw, radio, sink);
        }
    }

    /// Decode and dispatch one inbound frame.
    pub fn handle_frame<R: RadioTransport>(
        &mut self,
        raw: &[u8],
        radio: &mut R,
        sink: &mut impl LineSink,
    ) {
        let decoded = match frame::decode(
            raw,
            &self.cipher,
            &self.tagger,
            &self.keys,
            self.cfg.pad_byte,
        ) {
            Ok(d) => d,
            Err(FrameError::Malformed) => {
                // Not attributable to any request; drop without ceremony.
                debug!("station: malformed frame dropped ({} bytes)", raw.len());
                return;
            }
            Err(e @ FrameError::UnknownVehicle) => {
                warn!("station: {e}");
                serial::emit_log(sink, "frame from unbound vehicle dropped");
                return;
            }
            Err(e @ FrameError::BadTag) => {
                warn!("station: {e}");
                serial::emit_log(sink, "frame with bad integrity tag dropped");
                return;
            }
        };

        let msg = decoded.message.as_str();
        if message::field(msg, TAG_ACK).is_some() {
            self.handle_ack(msg, sink);
        } else {
            self.handle_telemetry(&decoded, radio, sink);
        }
    }

    fn handle_ack(&mut self, msg: &str, sink: &mut impl LineSink) {
        let (Some(ack_id), Some(seq)) = (message::field(msg, TAG_ACK), message::seq_field(msg))
        else {
            debug!("station: ACK without sequence ignored");
            return;
        };
        if !self.engine.offer_ack(ack_id, seq) {
            return; // Unrelated ACK; never matched to the wrong request.
        }
        if let Some(slot) = self.inflight_slot.take() {
            if let Some(record) = self.fleet.slot_mut(slot) {
                record.mark_delivered();
                info!(
                    "station: command to {} confirmed, next seq {}",
                    record.id, record.outbound_seq
                );
            }
            self.pending[slot] = None;
        }
        serial::emit_log(sink, &format!("command to {ack_id} seq {seq} delivered"));
    }

    fn handle_telemetry<R: RadioTransport>(
        &mut self,
        decoded: &frame::Decoded,
        radio: &mut R,
        sink: &mut impl LineSink,
    ) {
        let id = &decoded.vehicle;
        let Some(slot) = self.fleet.register(id.clone()) else {
            warn!("station: fleet full, telemetry from {id} dropped");
            return;
        };
        let Some(record) = self.fleet.slot_mut(slot) else {
            return;
        };

        let fresh = record.apply_telemetry(&decoded.message);
        if fresh {
            serial::export_telemetry(sink, record);
        } else {
            debug!("station: duplicate telemetry from {id}, re-acknowledging");
        }

        // Acknowledge fresh AND duplicate reports — a duplicate means the
        // vehicle never saw the previous ACK.
        let Some(seq) = message::seq_field(&decoded.message) else {
            debug!("station: telemetry from {id} carries no sequence, not acked");
            return;
        };
        self.send_ack(id.as_str(), seq, radio);
    }

    fn send_ack<R: RadioTransport>(&mut self, id: &str, seq: u16, radio: &mut R) {
        let Some(key) = self.keys.lookup(id) else {
            return; // Decode succeeded, so the binding exists.
        };
        let mut ack = message::MessageBuilder::new();
        if ack.push(TAG_ACK, id).is_err() || ack.push(TAG_SEQ, seq).is_err() {
            return;
        }
        let frame = frame::encode(
            &ack.finish(),
            &key,
            &self.cipher,
            &self.tagger,
            self.cfg.ack_version,
            self.cfg.pad_byte,
        );
        if let Err(e) = radio.send(&frame) {
            warn!("station: ACK send failed: {e:?}");
        }
    }

    // ── Scheduling ───────────────────────────────────────────

    /// One scheduling step: advance the in-flight delivery, start the
    /// next one when idle. Returns the recommended sleep before the next
    /// pass.
    pub fn poll<R: RadioTransport>(
        &mut self,
        now_ms: u64,
        radio: &mut R,
        sink: &mut impl LineSink,
    ) -> u32 {
        if let PollStep::Exhausted { vehicle, seq } = self.engine.poll(now_ms, radio) {
            // Non-fatal: the command stays queued and a LATER pass
            // restarts the cycle with the same, un-incremented sequence.
            self.inflight_slot = None;
            serial::emit_log(sink, &format!("delivery to {vehicle} seq {seq} timed out"));
            return pass_delay_ms(&self.cfg, self.fleet.any_active());
        }

        if !self.engine.is_busy() {
            self.start_next_delivery(now_ms, radio);
        }

        pass_delay_ms(&self.cfg, self.fleet.any_active())
    }

    fn start_next_delivery<R: RadioTransport>(&mut self, now_ms: u64, radio: &mut R) {
        let slot = {
            let Self {
                robin,
                fleet,
                pending,
                ..
            } = self;
            robin.next_ready(N, |i| {
                fleet.slot(i).is_some_and(|r| r.active) && pending[i].is_some()
            })
        };
        let Some(slot) = slot else {
            return;
        };
        let (id, seq, mut msg) = {
            let (Some(record), Some(command)) = (self.fleet.slot(slot), self.pending[slot].as_ref())
            else {
                return;
            };
            (record.id.clone(), record.outbound_seq, command.clone())
        };

        if message::field(&msg, TAG_SEQ).is_none() {
            use core::fmt::Write as _;
            if write!(msg, "Seq:{seq};").is_err() {
                warn!("station: command for {id} too long once sequenced, dropped");
                self.pending[slot] = None;
                return;
            }
        }
        // The ACK must match the sequence actually on the wire, which the
        // upstream line may have supplied itself.
        let wire_seq = message::seq_field(&msg).unwrap_or(seq);

        let Some(key) = self.keys.lookup(id.as_str()) else {
            warn!("station: no key for {id}, command dropped");
            self.pending[slot] = None;
            return;
        };

        let encoded = frame::encode(
            &msg,
            &key,
            &self.cipher,
            &self.tagger,
            self.cfg.data_version,
            self.cfg.pad_byte,
        );
        if self.engine.begin(encoded, id, wire_seq, radio, now_ms).is_ok() {
            self.inflight_slot = Some(slot);
        }
    }
}
