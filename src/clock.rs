//! Clock & Slot (spec §4.A).
//!
//! Slots are fixed-width integer intervals over wall time. This module is
//! the only place that reads the system clock; everything else in the
//! crate works in slot numbers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::block::Slot;

/// Maps wall time to slot indices for a fixed `slot_duration`.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    slot_duration: Duration,
    /// Wall-clock instant that corresponds to slot 0.
    genesis_unix: Duration,
}

impl Clock {
    #[must_use]
    pub fn new(slot_duration: Duration, genesis_unix: Duration) -> Self {
        assert!(!slot_duration.is_zero(), "slot duration must be positive");
        Self {
            slot_duration,
            genesis_unix,
        }
    }

    /// `slot(t) = floor(t / SLOT_DURATION)`, relative to genesis.
    #[must_use]
    pub fn slot_at(&self, unix_time: Duration) -> Slot {
        unix_time
            .saturating_sub(self.genesis_unix)
            .as_secs_f64()
            .div_euclid(self.slot_duration.as_secs_f64()) as Slot
    }

    /// The current slot, using the system clock.
    #[must_use]
    pub fn now_slot(&self) -> Slot {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.slot_at(now)
    }

    /// Wall-clock instant at which `slot` begins.
    #[must_use]
    pub fn slot_start(&self, slot: Slot) -> Duration {
        self.genesis_unix + self.slot_duration * slot as u32
    }

    /// How long to sleep from now until `slot` begins. Zero if `slot` has
    /// already started.
    #[must_use]
    pub fn time_until(&self, slot: Slot) -> Duration {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.slot_start(slot).saturating_sub(now)
    }

    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_at_floors_to_slot_width() {
        let clock = Clock::new(Duration::from_secs(3), Duration::ZERO);
        assert_eq!(clock.slot_at(Duration::from_secs(0)), 0);
        assert_eq!(clock.slot_at(Duration::from_secs(2)), 0);
        assert_eq!(clock.slot_at(Duration::from_secs(3)), 1);
        assert_eq!(clock.slot_at(Duration::from_secs(8)), 2);
    }

    #[test]
    fn slot_start_is_inverse_of_slot_at_on_boundaries() {
        let clock = Clock::new(Duration::from_secs(3), Duration::from_secs(100));
        assert_eq!(clock.slot_start(5), Duration::from_secs(115));
        assert_eq!(clock.slot_at(Duration::from_secs(115)), 5);
    }
}
