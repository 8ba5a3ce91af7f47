use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    time::{Duration, Instant},
};

use crate::display::{TimerCallback, TimerId};

/// A timer waiting to fire.
#[derive(Debug)]
struct PendingTimer {
    /// Scheduled time.
    time: Instant,
    /// Timer identifier.
    id: TimerId,
}

impl PartialEq for PendingTimer {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for PendingTimer {}

/// Reverse order so the soonest timer is at the top. Timers due at the same
/// instant fire in scheduling order.
impl PartialOrd for PendingTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reverse order so the soonest timer is at the top.
impl Ord for PendingTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One-shot timers, soonest first. Cancelled timers leave a stale heap entry
/// behind that is skipped when it reaches the top.
#[derive(Default)]
pub(super) struct TimerHeap {
    /// Scheduled times.
    heap: BinaryHeap<PendingTimer>,
    /// Callbacks for live timers.
    callbacks: HashMap<TimerId, TimerCallback>,
    /// Next identifier to hand out.
    next_id: u64,
}

impl TimerHeap {
    /// Add a timer with an explicit time base.
    pub(super) fn add_at(
        &mut self,
        now: Instant,
        delay: Duration,
        callback: TimerCallback,
    ) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.heap.push(PendingTimer {
            time: now + delay,
            id,
        });
        self.callbacks.insert(id, callback);
        id
    }

    /// Add a timer that fires `delay` from now.
    pub(super) fn add(&mut self, delay: Duration, callback: TimerCallback) -> TimerId {
        self.add_at(Instant::now(), delay, callback)
    }

    /// Cancel a timer.
    pub(super) fn cancel(&mut self, id: TimerId) {
        self.callbacks.remove(&id);
    }

    /// Number of live timers.
    pub(super) fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Drop stale entries from the top of the heap.
    fn prune(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.callbacks.contains_key(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Time until the soonest live timer relative to `now`. `None` if no
    /// timers are pending, zero if one is overdue.
    pub(super) fn wait_at(&mut self, now: Instant) -> Option<Duration> {
        self.prune();
        self.heap
            .peek()
            .map(|top| top.time.checked_duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Time until the soonest live timer.
    pub(super) fn wait(&mut self) -> Option<Duration> {
        self.wait_at(Instant::now())
    }

    /// Remove and return the callback of the soonest timer due at `now`.
    pub(super) fn pop_due_at(&mut self, now: Instant) -> Option<TimerCallback> {
        self.prune();
        if self.heap.peek().is_some_and(|top| top.time <= now) {
            let top = self.heap.pop()?;
            return self.callbacks.remove(&top.id);
        }
        None
    }

    /// Remove and return the callback of the soonest timer that is due.
    pub(super) fn pop_due(&mut self) -> Option<TimerCallback> {
        self.pop_due_at(Instant::now())
    }

    /// Drop every timer.
    pub(super) fn clear(&mut self) {
        self.heap.clear();
        self.callbacks.clear();
    }
}
