//! Fixed-capacity per-vehicle key table.
//!
//! Maps a vehicle identifier to its 16-byte tag key. Keys arrive only over
//! the local serial channel (`CFG:` lines) and live in RAM — nothing
//! persists across a restart, the gateway re-injects every binding on boot
//! and every couple of minutes after that, which `upsert`'s in-place
//! update makes idempotent.
//!
//! There is no eviction: once every slot is occupied the table stays full
//! until restart. Acceptable at fleet scale (tens of vehicles), but it is
//! a hard ceiling and callers surface [`KeyStoreError::Full`] on the log
//! channel when they hit it.

use crate::error::KeyStoreError;
use crate::wire::frame::KeyLookup;
use crate::wire::message::VehicleId;

/// One identifier→key binding.
#[derive(Debug, Clone)]
struct Binding {
    id: VehicleId,
    key: [u8; 16],
}

/// The key table. `N` is the slot count, fixed at construction.
pub struct KeyStore<const N: usize> {
    slots: [Option<Binding>; N],
}

impl<const N: usize> KeyStore<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Vacate every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Bind `key` to `id`: update in place if `id` is already bound, else
    /// take the first vacant slot. When the table is full nothing is
    /// mutated and no key is bound.
    pub fn upsert(&mut self, id: VehicleId, key: [u8; 16]) -> Result<(), KeyStoreError> {
        for slot in self.slots.iter_mut().flatten() {
            if slot.id == id {
                slot.key = key;
                return Ok(());
            }
        }
        for slot in &mut self.slots {
            if slot.is_none() {
                *slot = Some(Binding { id, key });
                return Ok(());
            }
        }
        Err(KeyStoreError::Full)
    }

    /// Exact-match lookup; identifiers are compared byte for byte, no case
    /// folding.
    pub fn lookup(&self, id: &str) -> Option<[u8; 16]> {
        self.slots
            .iter()
            .flatten()
            .find(|b| b.id.as_str() == id)
            .map(|b| b.key)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

impl<const N: usize> Default for KeyStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> KeyLookup for KeyStore<N> {
    fn key_for(&self, id: &str) -> Option<[u8; 16]> {
        self.lookup(id)
    }
}

/// Expand serial-provisioned key material to the fixed 16-byte width.
///
/// The gateway injects keys as printable text that is often shorter than
/// a full cipher key; short material is right-padded with zero bytes.
/// Over-long or empty material is rejected rather than clipped — silently
/// truncating a key would bind a different key than the operator supplied.
pub fn key_from_material(raw: &[u8]) -> Result<[u8; 16], KeyStoreError> {
    if raw.is_empty() || raw.len() > 16 {
        return Err(KeyStoreError::BadKeyMaterial);
    }
    let mut key = [0u8; 16];
    key[..raw.len()].copy_from_slice(raw);
    Ok(key)
}
