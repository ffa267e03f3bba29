//! Field-node service — the foreground loop's brain on the vehicle side.
//!
//! The node periodically receives sensor readings from the sampling glue
//! as ready-made `Tag:Value` field text, wraps them into a telemetry
//! message carrying its identity, sequence, event flag and clock, and
//! drives the delivery engine until the post acknowledges. Inbound
//! command frames (display order changes) are applied, deduplicated by
//! sequence, and acknowledged in turn.
//!
//! The node holds exactly one key — its own. Frames for other vehicles
//! on the shared medium fail the key lookup and are dropped quietly.

use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::delivery::{DeliveryEngine, PollStep};
use crate::error::{DeliveryError, FrameError};
use crate::ledger::VehicleRecord;
use crate::transport::RadioTransport;
use crate::wire::cipher::Aes128Ecb;
use crate::wire::frame;
use crate::wire::message::{self, MessageBuilder, TAG_ACK, TAG_ID, TAG_SEQ, VehicleId};
use crate::wire::tag::Mix32;

/// Display order shown when no valid command has arrived (temperature,
/// humidity, pressure, luminosity).
pub const DEFAULT_DISPLAY_ORDER: &str = "THPL";

/// One vehicle's end of the link.
pub struct Node {
    cfg: LinkConfig,
    cipher: Aes128Ecb,
    tagger: Mix32,
    /// Own ledger record: sequence, pending event flag, last telemetry.
    record: VehicleRecord,
    key: [u8; 16],
    engine: DeliveryEngine,
    display_order: heapless::String<8>,
    /// Sequence of the last command applied — retransmissions are
    /// re-acknowledged without being re-applied.
    last_command_seq: Option<u16>,
}

impl Node {
    pub fn new(
        cfg: LinkConfig,
        id: VehicleId,
        key: [u8; 16],
        transport_key: &[u8; 16],
        jitter_seed: u32,
    ) -> Self {
        let mut display_order = heapless::String::new();
        let _ = display_order.push_str(DEFAULT_DISPLAY_ORDER);
        Self {
            cipher: Aes128Ecb::new(transport_key),
            tagger: Mix32,
            record: VehicleRecord::new(id),
            key,
            engine: DeliveryEngine::new(&cfg, jitter_seed),
            display_order,
            last_command_seq: None,
            cfg,
        }
    }

    pub fn record(&self) -> &VehicleRecord {
        &self.record
    }

    pub fn display_order(&self) -> &str {
        &self.display_order
    }

    /// True while a telemetry report is awaiting its ACK.
    pub fn is_reporting(&self) -> bool {
        self.engine.is_busy()
    }

    /// Latch a button press until the next confirmed report.
    pub fn press_button(&mut self) {
        self.record.pending_event = true;
    }

    // ── Outbound telemetry ───────────────────────────────────

    /// Wrap `sensor_fields` (ready-made `Tag:Value;` text from the
    /// sampling glue) into a telemetry report and start its delivery
    /// cycle. Refused with [`DeliveryError::Busy`] while the previous
    /// report is still in flight — the caller simply resubmits on its
    /// next sampling tick, with the same sequence.
    pub fn submit_telemetry<R: RadioTransport>(
        &mut self,
        sensor_fields: &str,
        clock_hhmmss: &str,
        radio: &mut R,
        now_ms: u64,
    ) -> Result<(), DeliveryError> {
        if self.engine.is_busy() {
            return Err(DeliveryError::Busy);
        }

        let mut b = MessageBuilder::new();
        b.push(TAG_ID, &self.record.id)?;
        for (tag, value) in message::fields(sensor_fields) {
            b.push(tag, value)?;
        }
        b.push("Btn", u8::from(self.record.pending_event))?;
        b.push(TAG_SEQ, self.record.outbound_seq)?;
        b.push("Time", clock_hhmmss)?;
        let msg = b.finish();

        let encoded = frame::encode(
            &msg,
            &self.key,
            &self.cipher,
            &self.tagger,
            self.cfg.data_version,
            self.cfg.pad_byte,
        );
        self.engine.begin(
            encoded,
            self.record.id.clone(),
            self.record.outbound_seq,
            radio,
            now_ms,
        )
    }

    /// Advance the in-flight report. On exhaustion the sequence stays
    /// put; the next sampling tick restarts the cycle and the post
    /// deduplicates if an earlier attempt did land.
    pub fn poll<R: RadioTransport>(&mut self, now_ms: u64, radio: &mut R) -> PollStep {
        self.engine.poll(now_ms, radio)
    }

    // ── Inbound frames ───────────────────────────────────────

    /// Decode and dispatch one inbound frame.
    pub fn handle_frame<R: RadioTransport>(&mut self, raw: &[u8], radio: &mut R, now_ms: u64) {
        let my_id = self.record.id.clone();
        let key = self.key;
        let lookup = move |id: &str| (id == my_id.as_str()).then_some(key);

        let decoded = match frame::decode(raw, &self.cipher, &self.tagger, &lookup, self.cfg.pad_byte)
        {
            Ok(d) => d,
            Err(FrameError::Malformed) => {
                debug!("node: malformed frame dropped");
                return;
            }
            Err(FrameError::UnknownVehicle) => {
                // Somebody else's traffic on the shared medium.
                debug!("node: frame for another vehicle ignored");
                return;
            }
            Err(e @ FrameError::BadTag) => {
                warn!("node: {e}");
                return;
            }
        };

        let msg = decoded.message.as_str();
        if message::field(msg, TAG_ACK).is_some() {
            self.handle_ack(msg);
        } else {
            self.handle_command(msg, radio, now_ms);
        }
    }

    fn handle_ack(&mut self, msg: &str) {
        let (Some(ack_id), Some(seq)) = (message::field(msg, TAG_ACK), message::seq_field(msg))
        else {
            debug!("node: ACK without sequence ignored");
            return;
        };
        if self.engine.offer_ack(ack_id, seq) {
            self.record.mark_delivered();
            info!(
                "node: report confirmed, next seq {}",
                self.record.outbound_seq
            );
        }
    }

    fn handle_command<R: RadioTransport>(&mut self, msg: &str, radio: &mut R, _now_ms: u64) {
        let Some(seq) = message::seq_field(msg) else {
            debug!("node: command without sequence ignored");
            return;
        };

        if self.last_command_seq == Some(seq) {
            debug!("node: duplicate command seq {seq}, re-acknowledging");
        } else {
            self.apply_command(msg);
            self.last_command_seq = Some(seq);
        }

        self.send_ack(seq, radio);
    }

    fn apply_command(&mut self, msg: &str) {
        if let Some(order) = message::field(msg, "Ord") {
            if order.len() == 4 {
                self.display_order.clear();
                let _ = self.display_order.push_str(order);
            } else {
                // Malformed order resets to the default, matching the
                // display glue's expectations.
                self.display_order.clear();
                let _ = self.display_order.push_str(DEFAULT_DISPLAY_ORDER);
            }
            info!("node: display order now {}", self.display_order);
        }
    }

    fn send_ack<R: RadioTransport>(&mut self, seq: u16, radio: &mut R) {
        let mut b = MessageBuilder::new();
        if b.push(TAG_ACK, &self.record.id).is_err() || b.push(TAG_SEQ, seq).is_err() {
            return;
        }
        let encoded = frame::encode(
            &b.finish(),
            &self.key,
            &self.cipher,
            &self.tagger,
            self.cfg.ack_version,
            self.cfg.pad_byte,
        );
        if let Err(e) = radio.send(&encoded) {
            warn!("node: ACK send failed: {e:?}");
        }
    }
}
