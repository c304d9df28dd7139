//! Virtual-time timer queue
//!
//! Scheduled payloads are addressed by generational [`TimerId`] handles.
//! Time only moves when the owner calls [`TimerQueue::pop_due`] /
//! [`TimerQueue::advance_clock`], which keeps every firing deterministic:
//! entries fire in (fire time, insertion order).
//!
//! A cancelled handle is removed from the slot map immediately; its heap
//! entry is discarded lazily when it reaches the front. Slot map versions
//! guarantee a stale handle never aliases a newer timer.

use slotmap::{new_key_type, SlotMap};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

new_key_type! {
    /// Handle to a scheduled timer
    pub struct TimerId;
}

struct TimerEntry<T> {
    fire_at_ms: u64,
    payload: T,
}

/// Deterministic queue of delayed payloads
pub struct TimerQueue<T> {
    entries: SlotMap<TimerId, TimerEntry<T>>,
    /// (fire time, insertion sequence, handle), min-first
    order: BinaryHeap<Reverse<(u64, u64, TimerId)>>,
    now_ms: u64,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            order: BinaryHeap::new(),
            now_ms: 0,
            next_seq: 0,
        }
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `payload` at an absolute time
    ///
    /// Times in the past are clamped to now, so the entry fires on the next
    /// drain.
    pub fn schedule_at(&mut self, fire_at_ms: u64, payload: T) -> TimerId {
        let fire_at_ms = fire_at_ms.max(self.now_ms);
        let id = self.entries.insert(TimerEntry {
            fire_at_ms,
            payload,
        });
        self.order.push(Reverse((fire_at_ms, self.next_seq, id)));
        self.next_seq += 1;
        id
    }

    /// Schedule `payload` relative to now
    pub fn schedule_after(&mut self, delay_ms: u64, payload: T) -> TimerId {
        self.schedule_at(self.now_ms.saturating_add(delay_ms), payload)
    }

    /// Cancel a pending timer, returning its payload
    ///
    /// Returns `None` if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.entries.remove(id).map(|entry| entry.payload)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.contains_key(id)
    }

    /// Fire time of a pending timer
    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.fire_at_ms)
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending fire time
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.values().map(|entry| entry.fire_at_ms).min()
    }

    /// Pop the earliest pending timer due at or before `until_ms`
    ///
    /// Moves the clock forward to the popped timer's fire time.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, u64, T)> {
        while let Some(&Reverse((fire_at_ms, _, id))) = self.order.peek() {
            if !self.entries.contains_key(id) {
                // Cancelled
                self.order.pop();
                continue;
            }
            if fire_at_ms > until_ms {
                return None;
            }

            self.order.pop();
            let entry = self.entries.remove(id)?;
            self.now_ms = self.now_ms.max(entry.fire_at_ms);
            return Some((id, entry.fire_at_ms, entry.payload));
        }
        None
    }

    /// Move the clock forward without firing anything
    ///
    /// Never moves backwards; callers drain with [`pop_due`](Self::pop_due) first.
    pub fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Cancel everything, returning how many timers were pending
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue<&'static str>, until: u64) -> Vec<(u64, &'static str)> {
        let mut fired = Vec::new();
        while let Some((_, at, payload)) = queue.pop_due(until) {
            fired.push((at, payload));
        }
        queue.advance_clock(until);
        fired
    }

    #[test]
    fn test_fires_in_time_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(300, "c");
        queue.schedule_at(100, "a");
        queue.schedule_at(200, "b");

        assert_eq!(queue.next_deadline(), Some(100));
        assert_eq!(drain(&mut queue, 1000), vec![(100, "a"), (200, "b"), (300, "c")]);
        assert!(queue.is_empty());
        assert_eq!(queue.now_ms(), 1000);
    }

    #[test]
    fn test_ties_fire_in_insertion_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(50, "first");
        queue.schedule_at(50, "second");
        queue.schedule_at(50, "third");

        let fired: Vec<_> = drain(&mut queue, 50).into_iter().map(|(_, p)| p).collect();
        assert_eq!(fired, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_due_timers_fire() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(100, "early");
        queue.schedule_at(500, "late");

        assert_eq!(drain(&mut queue, 250), vec![(100, "early")]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.now_ms(), 250);

        // Relative scheduling uses the advanced clock
        let id = queue.schedule_after(100, "relative");
        assert_eq!(queue.deadline(id), Some(350));
        assert_eq!(drain(&mut queue, 600), vec![(350, "relative"), (500, "late")]);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule_at(100, "a");
        queue.schedule_at(200, "b");

        assert_eq!(queue.cancel(a), Some("a"));
        assert!(!queue.is_pending(a));
        assert_eq!(queue.cancel(a), None);

        assert_eq!(drain(&mut queue, 1000), vec![(200, "b")]);
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let mut queue = TimerQueue::new();
        let old = queue.schedule_at(100, "old");
        drain(&mut queue, 100);

        let new = queue.schedule_at(200, "new");
        assert_ne!(old, new);
        assert_eq!(queue.cancel(old), None);
        assert!(queue.is_pending(new));
    }

    #[test]
    fn test_past_schedule_clamps_to_now() {
        let mut queue = TimerQueue::new();
        queue.advance_clock(500);
        let id = queue.schedule_at(100, "late");
        assert_eq!(queue.deadline(id), Some(500));
        assert_eq!(drain(&mut queue, 500), vec![(500, "late")]);
    }

    #[test]
    fn test_clear() {
        let mut queue = TimerQueue::new();
        queue.schedule_at(10, "a");
        queue.schedule_at(20, "b");
        assert_eq!(queue.clear(), 2);
        assert!(drain(&mut queue, 100).is_empty());
    }
}
