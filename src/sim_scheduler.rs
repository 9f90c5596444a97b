// Virtual clock + queue driver.
//
// One Scheduler value is owned per simulation run; there is no process-wide
// simulator singleton. Callbacks never block a real thread: "waiting" is
// always expressed by scheduling a future event on this queue.

use crate::sim_error::SimError;
use crate::sim_event_queue::{EventHandle, EventQueue};
use crate::sim_interface::SimTime;

pub struct Scheduler<T> {
    queue: EventQueue<T>,
    now: SimTime,
    stop_time: Option<SimTime>,
    dispatched: usize,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::new(),
            now: 0,
            stop_time: None,
            dispatched: 0,
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Inclusive stop time: events scheduled exactly at `time` still run,
    /// events strictly after do not.
    pub fn stop_at(&mut self, time: SimTime) {
        self.stop_time = Some(time);
    }

    /// Schedule a payload `delta` after the current virtual time.
    pub fn schedule(&mut self, delta: SimTime, payload: T) -> EventHandle {
        self.queue.schedule_at(self.now + delta, payload)
    }

    /// Schedule a payload at an absolute virtual time.
    pub fn schedule_at(&mut self, time: SimTime, payload: T) -> EventHandle {
        self.queue.schedule_at(time, payload)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), SimError> {
        self.queue.cancel(handle)
    }

    /// Number of live (not yet dispatched, not cancelled) events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Number of events dispatched so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Pop the next event and advance the clock to it.
    ///
    /// Returns None when the queue is empty or the next event lies strictly
    /// after the stop time; in both cases the clock is parked at the stop
    /// time (when one is set) so `now()` reports where the run halted.
    pub fn advance(&mut self) -> Option<(SimTime, T)> {
        match self.queue.peek_time() {
            Some(next) => {
                if let Some(stop) = self.stop_time {
                    if next > stop {
                        self.now = self.now.max(stop);
                        return None;
                    }
                }
                let (time, payload) = self.queue.pop_next()?;
                // clock never moves backwards, even for events scheduled
                // at an absolute time already in the past
                self.now = self.now.max(time);
                self.dispatched += 1;
                Some((time, payload))
            }
            None => {
                if let Some(stop) = self.stop_time {
                    self.now = self.now.max(stop);
                }
                None
            }
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_interface::{millis, seconds};

    #[test]
    fn test_clock_advances_to_dispatch_time() {
        let mut sched = Scheduler::new();
        sched.schedule(millis(10), "a");
        sched.schedule(millis(25), "b");

        assert_eq!(sched.now(), 0);
        assert_eq!(sched.advance(), Some((millis(10), "a")));
        assert_eq!(sched.now(), millis(10));
        assert_eq!(sched.advance(), Some((millis(25), "b")));
        assert_eq!(sched.now(), millis(25));
        assert_eq!(sched.advance(), None);
    }

    #[test]
    fn test_relative_schedule_uses_current_time() {
        let mut sched = Scheduler::new();
        sched.schedule(millis(10), "first");

        sched.advance();
        // now at 10ms, +5ms lands at 15ms
        sched.schedule(millis(5), "second");
        assert_eq!(sched.advance(), Some((millis(15), "second")));
    }

    #[test]
    fn test_stop_time_is_inclusive() {
        let mut sched = Scheduler::new();
        sched.stop_at(seconds(5));
        sched.schedule_at(seconds(5), "at-stop");
        sched.schedule_at(seconds(5) + 1, "after-stop");

        assert_eq!(sched.advance(), Some((seconds(5), "at-stop")));
        assert_eq!(sched.advance(), None);
        assert_eq!(sched.now(), seconds(5));
        // the event strictly after the stop time was never dispatched
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_clock_parks_at_stop_when_queue_drains() {
        let mut sched: Scheduler<()> = Scheduler::new();
        sched.stop_at(seconds(5));
        sched.schedule_at(millis(20), ());

        assert!(sched.advance().is_some());
        assert_eq!(sched.advance(), None);
        assert_eq!(sched.now(), seconds(5));
    }

    #[test]
    fn test_cancel_through_scheduler() {
        let mut sched = Scheduler::new();
        let handle = sched.schedule(millis(1), "gone");
        sched.schedule(millis(2), "kept");

        sched.cancel(handle).unwrap();
        assert_eq!(sched.advance(), Some((millis(2), "kept")));
    }
}
