//! Cancellable self-rescheduling tasks.
//!
//! A [`Task`] is one repeating stream of a synth (a pulse, a transport, a
//! breathing phase). It tracks the audio-clock time of its next event and
//! the single host timer armed to wake up ahead of it. Re-arming cancels the
//! previous timer, and a fired timer is only honoured if it is the one
//! currently armed, so a late or duplicate wake-up can never fire an event
//! twice.

use crate::engine::scheduler::{OwnerId, Timer, TimerId, TimerQueue};

#[derive(Debug, Clone)]
pub struct Task {
    tag: u32,
    armed: Option<TimerId>,
    next_time: f64,
}

impl Task {
    pub fn new(tag: u32) -> Self {
        Self {
            tag,
            armed: None,
            next_time: 0.0,
        }
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Audio-clock time of the next event.
    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    pub fn set_next_time(&mut self, time: f64) {
        self.next_time = time;
    }

    /// Move the next event `interval` seconds later and return its time.
    pub fn advance(&mut self, interval: f64) -> f64 {
        self.next_time += interval;
        self.next_time
    }

    /// Arm the wake-up timer at host time `due`, replacing any armed one.
    pub fn arm(&mut self, timers: &mut TimerQueue, owner: OwnerId, due: f64) -> TimerId {
        self.cancel(timers);
        let id = timers.schedule(owner, due, self.tag);
        self.armed = Some(id);
        id
    }

    /// Cancel the armed timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self, timers: &mut TimerQueue) -> bool {
        self.armed.take().is_some_and(|id| timers.cancel(id))
    }

    /// Accept a fired timer if it is the one this task armed. Disarms the
    /// task so the handler can re-arm it.
    pub fn fired(&mut self, timer: &Timer) -> bool {
        if timer.tag == self.tag && self.armed == Some(timer.id) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearming_replaces_the_timer() {
        let mut timers = TimerQueue::new();
        let mut task = Task::new(3);
        let first = task.arm(&mut timers, 1, 0.5);
        let second = task.arm(&mut timers, 1, 0.6);

        assert!(!timers.is_pending(first));
        assert!(timers.is_pending(second));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_only_the_armed_timer_is_accepted() {
        let mut timers = TimerQueue::new();
        let mut task = Task::new(0);
        let mut other = Task::new(1);
        task.arm(&mut timers, 1, 0.1);
        other.arm(&mut timers, 1, 0.2);

        let fired = timers.pop_due(0.1).unwrap();
        assert!(!other.fired(&fired));
        assert!(task.fired(&fired));
        // the same wake-up again is stale
        assert!(!task.fired(&fired));
        assert!(!task.is_armed());
    }

    #[test]
    fn test_cancel_disarms() {
        let mut timers = TimerQueue::new();
        let mut task = Task::new(0);
        task.arm(&mut timers, 1, 0.1);
        assert!(task.cancel(&mut timers));
        assert!(!task.cancel(&mut timers));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_advance_accumulates() {
        let mut task = Task::new(0);
        task.set_next_time(1.0);
        assert_eq!(task.advance(0.25), 1.25);
        assert_eq!(task.advance(0.25), 1.5);
        assert_eq!(task.next_time(), 1.5);
    }
}
