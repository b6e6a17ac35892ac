//! Deterministic simulation clock: monotonic simulated time plus a min-heap
//! of due scheduled callbacks, tie-broken by insertion order.

use crate::error::ClockError;
use crate::scalar::{Duration, Timestamp};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{trace, warn};

/// A callback scheduled to fire once the clock reaches or passes its due time.
///
/// Boxed as `FnMut` so callbacks may carry mutable captured state (e.g. an order router
/// closing over the order it must deliver).
pub type Callback = Box<dyn FnMut(Timestamp) + Send>;

struct ScheduledEvent {
    due: Timestamp,
    seq: u64,
    callback: Callback,
}

impl ScheduledEvent {
    fn key(&self) -> (Timestamp, u64) {
        (self.due, self.seq)
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (due, seq) pops first.
        other.key().cmp(&self.key())
    }
}

/// The deterministic simulation clock.
///
/// `advance_to` is the only place simulated time passes and scheduled callbacks run.
/// Callbacks are drained into a local buffer and invoked *after* the heap is released,
/// so a callback that calls `schedule`/`advance_to` again does not re-enter a borrow.
pub struct SimClock {
    now: Timestamp,
    heap: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(Timestamp::ZERO)
    }
}

impl SimClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: start,
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn next_event_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|event| event.due)
    }

    /// Pushes a callback to fire once `now() >= at`. `at < now()` is accepted;
    /// the callback simply fires on the *next* `advance_*` call rather than rewinding the clock.
    pub fn schedule(&mut self, at: Timestamp, callback: Callback) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent {
            due: at,
            seq,
            callback,
        });
    }

    pub fn schedule_after(&mut self, delay: Duration, callback: Callback) {
        self.schedule(self.now + delay, callback);
    }

    /// Clears all scheduled events and resets `now` to `t`, for property 6 (run/reset/run
    /// determinism).
    pub fn reset(&mut self, t: Timestamp) {
        self.heap.clear();
        self.now = t;
        self.next_seq = 0;
    }

    /// Advances `now` to `t`, firing every scheduled callback with `due <= t`, in
    /// (due, insertion-order) order. Fails with [`ClockError::Rewind`] if `t < now()`.
    pub fn advance_to(&mut self, t: Timestamp) -> Result<(), ClockError> {
        if t < self.now {
            return Err(ClockError::Rewind {
                now: self.now,
                requested: t,
            });
        }
        self.now = t;

        // Pop every due event into a buffer first: invoking callbacks while still holding
        // a mutable borrow of `self.heap` would prevent the callback from scheduling new
        // events on this same clock.
        let mut due = Vec::new();
        while let Some(event) = self.heap.peek() {
            if event.due > self.now {
                break;
            }
            due.push(self.heap.pop().expect("peeked Some"));
        }

        for mut event in due {
            trace!(due = ?event.due, now = ?self.now, "firing scheduled callback");
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (event.callback)(self.now)
            }));
            if result.is_err() {
                warn!(due = ?event.due, "scheduled callback panicked; continuing replay");
            }
        }

        Ok(())
    }

    pub fn advance_by(&mut self, delta: Duration) -> Result<(), ClockError> {
        self.advance_to(self.now + delta)
    }
}
