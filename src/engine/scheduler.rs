//! Host-clock timers.
//!
//! Timers are wake-ups, not sound events: a synth arms one a little ahead of
//! the audio-clock time it wants to schedule, and does the actual scheduling
//! on the audio clock when the timer fires. Every timer belongs to an owner
//! (one synth activation) so the engine can cancel everything a synth left
//! behind in one call.

use std::collections::{BTreeMap, HashMap};

/// Identifies one synth activation. Timers whose owner is gone are dropped
/// instead of delivered.
pub type OwnerId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A fired (or pending) timer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timer {
    pub id: TimerId,
    pub owner: OwnerId,
    /// Host-clock due time in seconds
    pub due: f64,
    /// Owner-defined discriminator (which of the owner's tasks this is)
    pub tag: u32,
}

/// Timers ordered by due time, then by creation order.
#[derive(Default)]
pub struct TimerQueue {
    queue: BTreeMap<(u64, TimerId), Timer>,
    index: HashMap<TimerId, u64>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer due at host time `due` (seconds).
    pub fn schedule(&mut self, owner: OwnerId, due: f64, tag: u32) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let key = due_key(due);
        self.queue.insert(
            (key, id),
            Timer {
                id,
                owner,
                due,
                tag,
            },
        );
        self.index.insert(id, key);
        id
    }

    /// Cancel a pending timer. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.queue.remove(&(key, id)).is_some(),
            None => false,
        }
    }

    /// Cancel every pending timer of `owner`. Returns how many were pending.
    pub fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let doomed: Vec<(u64, TimerId)> = self
            .queue
            .iter()
            .filter(|(_, t)| t.owner == owner)
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            self.queue.remove(key);
            self.index.remove(&key.1);
        }
        doomed.len()
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Timer> {
        let (&key, timer) = self.queue.iter().next()?;
        if timer.due > now {
            return None;
        }
        self.index.remove(&key.1);
        self.queue.remove(&key)
    }

    pub fn next_due(&self) -> Option<f64> {
        self.queue.values().next().map(|t| t.due)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_for(&self, owner: OwnerId) -> usize {
        self.queue.values().filter(|t| t.owner == owner).count()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }
}

/// Nanosecond key so timers sort by due time. Negative and non-finite due
/// times are due immediately.
fn due_key(due: f64) -> u64 {
    if due.is_finite() && due > 0.0 {
        (due * 1e9).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_due_order() {
        let mut timers = TimerQueue::new();
        let late = timers.schedule(1, 0.3, 0);
        let early = timers.schedule(1, 0.1, 0);
        let tie = timers.schedule(2, 0.1, 0);

        assert!(timers.pop_due(0.05).is_none());
        assert_eq!(timers.pop_due(1.0).map(|t| t.id), Some(early));
        assert_eq!(timers.pop_due(1.0).map(|t| t.id), Some(tie));
        assert_eq!(timers.pop_due(1.0).map(|t| t.id), Some(late));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(1, 0.1, 7);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.pop_due(10.0).is_none());
    }

    #[test]
    fn test_cancel_owner_leaves_others() {
        let mut timers = TimerQueue::new();
        timers.schedule(1, 0.1, 0);
        timers.schedule(1, 0.2, 1);
        let other = timers.schedule(2, 0.15, 0);

        assert_eq!(timers.pending_for(1), 2);
        assert_eq!(timers.cancel_owner(1), 2);
        assert_eq!(timers.pending_for(1), 0);
        assert!(timers.is_pending(other));
        assert_eq!(timers.next_due(), Some(0.15));
    }

    #[test]
    fn test_past_due_fires_immediately() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(1, -3.0, 0);
        assert_eq!(timers.pop_due(0.0).map(|t| t.id), Some(id));
    }
}
