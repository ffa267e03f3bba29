//! Fleet ledger — per-vehicle mutable state on the command-post side.
//!
//! A fixed-capacity arena of [`VehicleRecord`] slots. Records are created
//! inactive when a vehicle is first provisioned, activated by their first
//! inbound telemetry, and never destroyed — a vehicle that goes quiet is
//! conceptually deactivated, not removed. The arena is owned by the
//! foreground loop exclusively; nothing here crosses the interrupt
//! boundary.
//!
//! A field node reuses [`VehicleRecord`] directly for its own single
//! record, so sequence and pending-event bookkeeping behave identically on
//! both ends of the link.

use heapless::FnvIndexMap;

use crate::wire::message::{self, TAG_ID, VehicleId};

/// Outbound sequence numbers live in `[0, 1000)`.
pub const SEQ_MODULUS: u16 = 1000;

/// Last-known telemetry fields, tag → value.
/// Sized for the observed token set with headroom for a couple of
/// revisions' extra tags; oversized or surplus tags are ignored.
pub type FieldMap = FnvIndexMap<heapless::String<8>, heapless::String<24>, 8>;

// ── Vehicle record ───────────────────────────────────────────

/// Mutable state for one vehicle.
#[derive(Debug, Clone, Default)]
pub struct VehicleRecord {
    pub id: VehicleId,
    /// Set by the first inbound telemetry; an inactive record is skipped
    /// by the scheduler.
    pub active: bool,
    /// Last-known telemetry fields (everything except the `ID` token).
    pub fields: FieldMap,
    /// Sequence embedded in the next outbound message. Increments only on
    /// confirmed delivery, modulo [`SEQ_MODULUS`].
    pub outbound_seq: u16,
    /// A button/event press waiting to be reported; cleared only once the
    /// report is acknowledged.
    pub pending_event: bool,
    /// Sequence of the last telemetry applied — the receive-side
    /// deduplication anchor for retransmitted frames.
    pub last_telemetry_seq: Option<u16>,
}

impl VehicleRecord {
    /// A fresh, inactive record.
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Merge an authenticated telemetry message into the record and
    /// activate it. Returns `false` when the message's sequence matches
    /// the last applied one — a retransmission whose ACK was lost; the
    /// caller re-acknowledges but does not re-export.
    pub fn apply_telemetry(&mut self, msg: &str) -> bool {
        let seq = message::seq_field(msg);
        if seq.is_some() && seq == self.last_telemetry_seq && self.active {
            return false;
        }

        for (tag, value) in message::fields(msg) {
            if tag == TAG_ID {
                continue;
            }
            let (Ok(tag), Ok(value)) = (
                heapless::String::try_from(tag),
                heapless::String::try_from(value),
            ) else {
                continue; // Oversized token — ignore, don't reject the frame.
            };
            let _ = self.fields.insert(tag, value);
        }

        self.active = true;
        self.last_telemetry_seq = seq;
        true
    }

    /// Confirmed delivery: advance the sequence and clear the pending
    /// event flag.
    pub fn mark_delivered(&mut self) {
        self.outbound_seq = (self.outbound_seq + 1) % SEQ_MODULUS;
        self.pending_event = false;
    }

    /// Convenience accessor into the field map.
    pub fn field(&self, tag: &str) -> Option<&str> {
        let key = heapless::String::<8>::try_from(tag).ok()?;
        self.fields.get(&key).map(heapless::String::as_str)
    }
}

// ── Fleet arena ──────────────────────────────────────────────

/// Fixed-capacity arena of vehicle records, indexed by slot.
pub struct Fleet<const N: usize> {
    slots: [Option<VehicleRecord>; N],
}

impl<const N: usize> Fleet<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Reserve a slot for `id` (inactive until telemetry arrives).
    /// Idempotent; returns the slot index, or `None` when the arena is
    /// full.
    pub fn register(&mut self, id: VehicleId) -> Option<usize> {
        if let Some(i) = self.find(id.as_str()) {
            return Some(i);
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(VehicleRecord::new(id));
                return Some(i);
            }
        }
        None
    }

    /// Slot index for `id`, if registered.
    pub fn find(&self, id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.id.as_str() == id))
    }

    pub fn get(&self, id: &str) -> Option<&VehicleRecord> {
        self.find(id).and_then(|i| self.slot(i))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut VehicleRecord> {
        let i = self.find(id)?;
        self.slots[i].as_mut()
    }

    pub fn slot(&self, i: usize) -> Option<&VehicleRecord> {
        self.slots.get(i).and_then(Option::as_ref)
    }

    pub fn slot_mut(&mut self, i: usize) -> Option<&mut VehicleRecord> {
        self.slots.get_mut(i).and_then(Option::as_mut)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Occupied record iterator in fixed slot order.
    pub fn iter(&self) -> impl Iterator<Item = &VehicleRecord> {
        self.slots.iter().flatten()
    }

    pub fn any_active(&self) -> bool {
        self.iter().any(|r| r.active)
    }
}

impl<const N: usize> Default for Fleet<N> {
    fn default() -> Self {
        Self::new()
    }
}
