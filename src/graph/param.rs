use crate::MIN_TIME;

/*
Audio Parameters
================

Every value a toy moves over time (a gain envelope, a filter sweep, a pitch
bend) is an AudioParam. A param has an intrinsic value and an optional
timeline of automation events, evaluated per sample on the audio clock:

  set_value_at_time(v, t)               jump to v at t
  linear_ramp_to_value_at_time(v, t)    straight line from the previous event
  exponential_ramp_to_value_at_time     constant-ratio curve from the previous
                                        event (holds when the endpoints differ
                                        in sign or touch zero)

Between events the value holds. Before the first event the intrinsic value
applies. A ramp scheduled with no earlier event starts from the value the
param had when the ramp was added.

  gain
  0.35 |      ____
       |     /    \
  0.0  |____/      \________
       t0  +.01  +.06 +.065

Assigning with set_value() drops the timeline and replaces the intrinsic
value, which is how the toys apply live pointer updates.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    Set { time: f64, value: f32 },
    Linear { time: f64, value: f32 },
    Exponential { time: f64, value: f32 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::Set { time, .. }
            | Event::Linear { time, .. }
            | Event::Exponential { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Event::Set { value, .. }
            | Event::Linear { value, .. }
            | Event::Exponential { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    default: f32,
    min: f32,
    max: f32,
    /// Intrinsic value, used when no event governs.
    value: f32,
    /// Most recently computed value.
    current: f32,
    /// Audio time of the most recent evaluation.
    time: f64,
    events: Vec<Event>,
}

impl AudioParam {
    pub fn new(default: f32, min: f32, max: f32) -> Self {
        let value = default.clamp(min, max);
        Self {
            default,
            min,
            max,
            value,
            current: value,
            time: 0.0,
            events: Vec::new(),
        }
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// The value computed at the last evaluation (or the intrinsic value if
    /// nothing has been scheduled).
    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn has_automation(&self) -> bool {
        !self.events.is_empty()
    }

    /// Replace the intrinsic value and drop any scheduled automation.
    pub fn set_value(&mut self, value: f32) -> &mut Self {
        let value = self.sanitize(value).clamp(self.min, self.max);
        self.events.clear();
        self.value = value;
        self.current = value;
        self
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        let value = self.sanitize(value);
        self.insert(Event::Set { time, value });
        self
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        let value = self.sanitize(value);
        self.anchor_before(time);
        self.insert(Event::Linear { time, value });
        self
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        let value = self.sanitize(value);
        self.anchor_before(time);
        self.insert(Event::Exponential { time, value });
        self
    }

    /// Remove every event at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) -> &mut Self {
        self.events.retain(|e| e.time() < time);
        self
    }

    /// Evaluate the timeline at `t`, clamped to the param's range.
    pub fn value_at(&self, t: f64) -> f32 {
        self.raw_value_at(t).clamp(self.min, self.max)
    }

    /// Fill `out` with per-sample values starting at `start`, then forget
    /// the events that can no longer influence the future.
    pub(crate) fn fill(&mut self, start: f64, dt: f64, out: &mut [f32]) {
        if self.events.is_empty() {
            out.fill(self.value.clamp(self.min, self.max));
        } else {
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = self.value_at(start + i as f64 * dt);
            }
        }

        let end = start + out.len() as f64 * dt;
        self.current = out.last().copied().unwrap_or(self.current);
        self.time = end;
        self.prune(end);
    }

    /// Align the param with the audio clock without evaluating it, so a ramp
    /// scheduled on a fresh node starts from now rather than from zero.
    pub(crate) fn sync_time(&mut self, time: f64) {
        self.time = time;
    }

    fn sanitize(&self, value: f32) -> f32 {
        if value.is_finite() {
            value
        } else {
            self.default
        }
    }

    fn insert(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }

    fn anchor_before(&mut self, time: f64) {
        let has_earlier = self.events.iter().any(|e| e.time() < time);
        if !has_earlier && self.time < time {
            self.insert(Event::Set {
                time: self.time,
                value: self.current,
            });
        }
    }

    fn raw_value_at(&self, t: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time() <= t);

        let Some(next) = self.events.get(idx) else {
            return self.events.last().map_or(self.value, Event::value);
        };
        let Some(prev) = idx.checked_sub(1).map(|i| self.events[i]) else {
            return self.value;
        };

        let (t0, v0) = (prev.time(), prev.value());
        match *next {
            Event::Set { .. } => v0,
            Event::Linear { time: t1, value: v1 } => {
                if t1 - t0 <= MIN_TIME {
                    v1
                } else {
                    let ratio = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32;
                    v0 + (v1 - v0) * ratio
                }
            }
            Event::Exponential { time: t1, value: v1 } => {
                if v0 * v1 <= 0.0 {
                    v0
                } else if t1 - t0 <= MIN_TIME {
                    v1
                } else {
                    let ratio = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32;
                    v0 * (v1 / v0).powf(ratio)
                }
            }
        }
    }

    fn prune(&mut self, now: f64) {
        let past = self.events.partition_point(|e| e.time() <= now);
        if past == self.events.len() {
            if let Some(last) = self.events.last() {
                self.value = last.value();
            }
            self.events.clear();
        } else if past >= 2 {
            // keep one past event as the start of the next ramp
            self.events.drain(..past - 1);
        }
    }
}
