//! Deterministic timer queue driven by an explicit virtual clock.
//!
//! Key properties:
//! - Total ordering on `(deadline, id)`; timers due at the same instant fire
//!   in the order they were scheduled.
//! - Cancellation is immediate and does not perturb the order of the rest.
//! - Periodic timers keep their id across re-arms, so a single `cancel`
//!   stops them for good.
//! - Due timers are popped one at a time so each callback runs to completion
//!   before the next is considered (the caller may cancel or schedule timers
//!   in between).
//!
//! Vec-backed: the engine never holds more than a handful of timers.

use foundation::time::Millis;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Key {
    deadline: Millis,
    id: TimerId,
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Entry<T> {
    key: Key,
    period_ms: Option<u64>,
    payload: T,
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub id: TimerId,
    /// The instant the timer was scheduled for (not the pop time).
    pub at: Millis,
    pub payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires once, `delay_ms` after `now`.
    pub fn schedule_once(&mut self, now: Millis, delay_ms: u64, payload: T) -> TimerId {
        self.insert(now + delay_ms, None, payload)
    }

    /// Fires every `period_ms`, first at `now + period_ms`.
    ///
    /// A zero period is clamped to 1 ms so the queue always makes progress.
    pub fn schedule_every(&mut self, now: Millis, period_ms: u64, payload: T) -> TimerId {
        let period_ms = period_ms.max(1);
        self.insert(now + period_ms, Some(period_ms), payload)
    }

    fn insert(&mut self, deadline: Millis, period_ms: Option<u64>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            key: Key { deadline, id },
            period_ms,
            payload,
        });
        id
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.key.id == id)
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key.id != id);
        self.entries.len() != before
    }

    /// Cancels every timer. Returns how many were pending.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.entries.iter().map(|e| e.key).min().map(|k| k.deadline)
    }

    /// Pops the earliest timer whose deadline is at or before `now`.
    ///
    /// Periodic timers are re-armed one period after their own deadline (not
    /// after `now`), so a late pump catches up tick by tick instead of
    /// silently dropping ticks.
    pub fn pop_due(&mut self, now: Millis) -> Option<Fired<T>> {
        let mut best_idx: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.key.deadline > now {
                continue;
            }
            match best_idx {
                None => best_idx = Some(idx),
                Some(best) => {
                    if entry.key < self.entries[best].key {
                        best_idx = Some(idx);
                    }
                }
            }
        }

        let idx = best_idx?;
        let key = self.entries[idx].key;
        match self.entries[idx].period_ms {
            Some(period_ms) => {
                let entry = &mut self.entries[idx];
                entry.key.deadline = key.deadline + period_ms;
                Some(Fired {
                    id: key.id,
                    at: key.deadline,
                    payload: entry.payload.clone(),
                })
            }
            None => {
                let entry = self.entries.swap_remove(idx);
                Some(Fired {
                    id: key.id,
                    at: key.deadline,
                    payload: entry.payload,
                })
            }
        }
    }
}
