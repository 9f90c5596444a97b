// Ordered multimap of scheduled events by virtual time.
//
// Events are keyed by (time, seq) in a BTreeMap: earliest time first,
// ties broken by ascending sequence id (insertion order), which makes
// replay deterministic. Cancellation marks the slot inert instead of
// removing it; pop_next discards inert slots lazily.

use std::collections::BTreeMap;

use crate::sim_error::SimError;
use crate::sim_interface::{EventSeq, SimTime};

/// Handle returned by `schedule_at`, used to cancel the event later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHandle {
    time: SimTime,
    seq: EventSeq,
}

impl EventHandle {
    pub fn time(&self) -> SimTime {
        self.time
    }
}

struct Slot<T> {
    payload: T,
    cancelled: bool,
}

/// Ordered queue of scheduled event payloads.
///
/// Generic over the payload so the core can use a closed event enum and
/// tests can use plain markers.
pub struct EventQueue<T> {
    slots: BTreeMap<(SimTime, EventSeq), Slot<T>>,
    next_seq: EventSeq,
    live: usize,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            next_seq: 0,
            live: 0,
        }
    }

    /// Schedule a payload at an absolute virtual time.
    pub fn schedule_at(&mut self, time: SimTime, payload: T) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.slots.insert(
            (time, seq),
            Slot {
                payload,
                cancelled: false,
            },
        );
        self.live += 1;

        EventHandle { time, seq }
    }

    /// Mark an event inert so its payload is never dispatched.
    ///
    /// Fails with InvalidHandle when the handle was already cancelled or
    /// the event was already dispatched.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), SimError> {
        match self.slots.get_mut(&(handle.time, handle.seq)) {
            Some(slot) if !slot.cancelled => {
                slot.cancelled = true;
                self.live -= 1;
                Ok(())
            }
            _ => Err(SimError::InvalidHandle(handle.seq)),
        }
    }

    /// Pop the next live event, discarding cancelled slots along the way.
    pub fn pop_next(&mut self) -> Option<(SimTime, T)> {
        while let Some(((time, _seq), slot)) = self.slots.pop_first() {
            if slot.cancelled {
                continue;
            }
            self.live -= 1;
            return Some((time, slot.payload));
        }
        None
    }

    /// Virtual time of the next live event, without removing it.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        // purge cancelled heads so the peek is accurate
        while let Some((_, slot)) = self.slots.first_key_value() {
            if !slot.cancelled {
                break;
            }
            self.slots.pop_first();
        }
        self.slots.first_key_value().map(|((time, _), _)| *time)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
