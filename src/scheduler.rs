//! Round-robin slot scheduler for the command post.
//!
//! The post may have outbound work for several vehicles at once, but the
//! link allows exactly one outstanding request per delivery cycle. The
//! scheduler iterates fleet slots in a fixed cyclic order, hands the
//! foreground loop one ready slot per pass, and resumes AFTER that slot
//! next pass so a chatty vehicle cannot starve the rest.
//!
//! The scheduler is deliberately dumb: it knows slot indices and a
//! readiness predicate, nothing about frames or deliveries. The station
//! service decides what "ready" means (active record + queued command)
//! and drives the delivery engine to completion before asking again.

use crate::config::LinkConfig;

/// Cyclic slot selector.
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// The next slot in cyclic order for which `ready` holds, checking
    /// each of the `slot_count` slots at most once. Skipping a slot is a
    /// single predicate call — inactive slots cost O(1), no engine work.
    /// Advances the cursor past the returned slot.
    pub fn next_ready(
        &mut self,
        slot_count: usize,
        ready: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        if slot_count == 0 {
            return None;
        }
        for offset in 0..slot_count {
            let slot = (self.cursor + offset) % slot_count;
            if ready(slot) {
                self.cursor = (slot + 1) % slot_count;
                return Some(slot);
            }
        }
        None
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep between scheduling passes: coarse when the whole fleet is quiet
/// (energy), tight as soon as anything is active (latency).
pub fn pass_delay_ms(cfg: &LinkConfig, any_active: bool) -> u32 {
    if any_active {
        cfg.active_pass_delay_ms
    } else {
        cfg.idle_pass_delay_ms
    }
}
