//! Leader schedule (spec §4.B/C/D).
//!
//! Pure functions of `(slot, static properties, dynamic properties)`; no
//! suspension is ever permitted while computing these (spec §5), so they
//! take plain references rather than locks.

use std::time::Duration;

use crate::block::{Slot, WitnessId};
use crate::clock::Clock;
use crate::properties::{GlobalDynamicProperty, GlobalStaticProperty};

/// The unique witness permitted to produce a block in `slot`:
/// `witnesses[(s + offset) mod N]` over the current rotation order.
#[must_use]
pub fn leader_of_slot(
    static_props: &GlobalStaticProperty,
    dynamic_props: &GlobalDynamicProperty,
    slot: Slot,
) -> WitnessId {
    let n = static_props.epoch_length();
    let order = dynamic_props.order();
    let idx = (slot + dynamic_props.offset()) % n;
    order[idx as usize]
}

/// Duration until the next slot in which `self_id` leads, used by the
/// producer to sleep between blocks. Searches at most one full epoch ahead,
/// since the schedule is periodic with that length.
#[must_use]
pub fn time_until_next_schedule(
    static_props: &GlobalStaticProperty,
    dynamic_props: &GlobalDynamicProperty,
    clock: &Clock,
    self_id: WitnessId,
) -> Duration {
    let now = clock.now_slot();
    let epoch_length = static_props.epoch_length();
    for ahead in 0..=epoch_length {
        let slot = now + ahead;
        if leader_of_slot(static_props, dynamic_props, slot) == self_id {
            return clock.time_until(slot);
        }
    }
    // Unreachable for a well-formed roster: `self_id` always appears exactly
    // once per epoch in `order`.
    Duration::ZERO
}
