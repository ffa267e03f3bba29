//! Serial line protocol — configuration in, telemetry export out.
//!
//! The peripheral glue owns the UART; this module owns the grammar. One
//! line per unit, newline-terminated by the glue:
//!
//! ```text
//!  in: CFG:AA100AA:KeySecret!!!!        key binding from the gateway
//!  in: ID:AA100AA;Ord:THPL;             outbound command for a vehicle
//! out: EXP:{"id":"AA100AA", ... }       authenticated telemetry, as JSON
//! out: LOG: key bound for AA100AA      human/gateway-visible core event
//! ```
//!
//! The gateway re-injects every `CFG:` binding on boot and periodically
//! afterwards; key upserts are idempotent so that costs nothing.

use serde::Serialize;

use crate::error::KeyStoreError;
use crate::keystore::key_from_material;
use crate::ledger::VehicleRecord;
use crate::wire::message::{self, MessageBuf, TAG_ID, VehicleId};

pub const CFG_PREFIX: &str = "CFG:";
pub const EXP_PREFIX: &str = "EXP:";
pub const LOG_PREFIX: &str = "LOG:";

// ── Line sink ────────────────────────────────────────────────

/// Where outbound serial lines go. The real adapter writes the UART; the
/// host sim and tests capture strings.
pub trait LineSink {
    fn line(&mut self, line: &str);
}

/// Sink that forwards every line to the logger — handy before the serial
/// adapter is wired up.
pub struct LogSink;

impl LineSink for LogSink {
    fn line(&mut self, line: &str) {
        log::info!("{line}");
    }
}

// ── Inbound parsing ──────────────────────────────────────────

/// One parsed inbound serial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialInput {
    /// `CFG:` binding for the key table.
    BindKey { id: VehicleId, key: [u8; 16] },
    /// Field-token line naming a vehicle: queue it for radio delivery.
    VehicleUpdate { id: VehicleId, message: MessageBuf },
    /// Recognized shape, unusable content — worth a `LOG:` line.
    Invalid(&'static str),
    /// Not for us (empty, chatter from the glue); dropped quietly.
    Ignored,
}

/// Parse one inbound line.
pub fn parse_line(line: &str) -> SerialInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return SerialInput::Ignored;
    }

    if let Some(rest) = line.strip_prefix(CFG_PREFIX) {
        let Some((id, material)) = rest.split_once(':') else {
            return SerialInput::Invalid("CFG line missing key material");
        };
        let Some(id) = VehicleId::parse(id) else {
            return SerialInput::Invalid("CFG line has a bad identifier");
        };
        return match key_from_material(material.as_bytes()) {
            Ok(key) => SerialInput::BindKey { id, key },
            Err(KeyStoreError::BadKeyMaterial) => {
                SerialInput::Invalid("CFG line has bad key material")
            }
            Err(_) => SerialInput::Invalid("CFG line rejected"),
        };
    }

    match message::field(line, TAG_ID).map(VehicleId::parse) {
        Some(Some(id)) => match MessageBuf::try_from(line) {
            Ok(message) => SerialInput::VehicleUpdate { id, message },
            Err(()) => SerialInput::Invalid("update line too long for a frame"),
        },
        Some(None) => SerialInput::Invalid("update line has a bad identifier"),
        None => SerialInput::Ignored,
    }
}

// ── Telemetry export ─────────────────────────────────────────

/// JSON shape the upstream gateway parses out of `EXP:` lines.
#[derive(Debug, Serialize)]
pub struct TelemetryExport<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Named resource levels, verbatim `k=v,...` text.
    pub raw_res: &'a str,
    pub btn: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u16>,
    pub timestamp: &'a str,
}

impl<'a> TelemetryExport<'a> {
    /// Snapshot a ledger record into the export shape.
    pub fn from_record(record: &'a VehicleRecord) -> Self {
        let (lat, lon) = record
            .field("Geo")
            .and_then(parse_geo)
            .map_or((None, None), |(a, b)| (Some(a), Some(b)));
        Self {
            id: record.id.as_str(),
            lat,
            lon,
            raw_res: record.field("Res").unwrap_or("0"),
            btn: u8::from(record.field("Btn") == Some("1")),
            seq: record.last_telemetry_seq,
            timestamp: record.field("Time").unwrap_or(""),
        }
    }
}

/// Emit one `EXP:` line for an updated record.
pub fn export_telemetry(sink: &mut impl LineSink, record: &VehicleRecord) {
    match serde_json::to_string(&TelemetryExport::from_record(record)) {
        Ok(json) => {
            let mut line = std::string::String::with_capacity(EXP_PREFIX.len() + json.len());
            line.push_str(EXP_PREFIX);
            line.push_str(&json);
            sink.line(&line);
        }
        Err(e) => log::warn!("serial: telemetry export failed: {e}"),
    }
}

/// Emit one `LOG:` line for a core event.
pub fn emit_log(sink: &mut impl LineSink, text: &str) {
    let mut line = std::string::String::with_capacity(LOG_PREFIX.len() + 1 + text.len());
    line.push_str(LOG_PREFIX);
    line.push(' ');
    line.push_str(text);
    sink.line(&line);
}

fn parse_geo(value: &str) -> Option<(f64, f64)> {
    let (lat, lon) = value.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}
