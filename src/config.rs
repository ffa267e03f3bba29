//! Link tuning parameters.
//!
//! All tunable values for the radio link core. The command post and the
//! field nodes must agree on the frame parameters (`pad_byte`, frame
//! revisions); the delivery/scheduling timings are per-end.

use serde::{Deserialize, Serialize};

use crate::wire::block::DEFAULT_PAD;
use crate::wire::frame::FrameVersion;

/// Core link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Radio ---
    /// Shared-medium radio group both ends tune to.
    pub radio_group: u8,

    // --- Framing ---
    /// Frame revision used for telemetry and command frames.
    pub data_version: FrameVersion,
    /// Frame revision used for ACK frames (smaller, less airtime).
    pub ack_version: FrameVersion,
    /// Payload pad byte. Protocol revisions disagree (space vs zero), so
    /// it is configuration, not a constant.
    pub pad_byte: u8,

    // --- Delivery ---
    /// Base ACK wait before a retransmission (milliseconds).
    pub ack_timeout_ms: u32,
    /// Upper bound of the random jitter added to each ACK wait.
    pub jitter_max_ms: u32,
    /// Total send attempts per delivery cycle (first send included).
    pub max_attempts: u8,

    // --- Scheduling ---
    /// Pass delay when no vehicle is active (coarse polling, saves power).
    pub idle_pass_delay_ms: u32,
    /// Pass delay when at least one vehicle is active (tight polling).
    pub active_pass_delay_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Radio
            radio_group: 16,

            // Framing
            data_version: FrameVersion::Extended,
            ack_version: FrameVersion::Standard,
            pad_byte: DEFAULT_PAD,

            // Delivery
            ack_timeout_ms: 400,
            jitter_max_ms: 150,
            max_attempts: 3,

            // Scheduling
            idle_pass_delay_ms: 1000, // 1 Hz when the fleet is quiet
            active_pass_delay_ms: 100, // 10 Hz with traffic in flight
        }
    }
}

impl LinkConfig {
    /// Reject configurations that would wedge the delivery engine.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_attempts == 0 {
            return Err(crate::error::Error::Config("max_attempts must be >= 1"));
        }
        if self.ack_timeout_ms == 0 {
            return Err(crate::error::Error::Config("ack_timeout_ms must be > 0"));
        }
        if self.active_pass_delay_ms > self.idle_pass_delay_ms {
            return Err(crate::error::Error::Config(
                "active pass delay must not exceed idle pass delay",
            ));
        }
        Ok(())
    }
}
