//! A single saw pulse through a resonant lowpass.
//!
//! Left is slow and low, right is fast and high. Up opens the filter and
//! raises its resonance until the pulse whistles.
//!
//! Each note is queued once the previous one has started, so at most one
//! note waits in the future and it is the only thing an update can still
//! change. Updates cancel it and queue it again with the new pitch and
//! spacing.

use tracing::debug;

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

const ATTACK: f64 = 0.01;
const HOLD: f64 = 0.05;
const RELEASE: f64 = 0.005;
const GAIN: f32 = 0.35;
const NOTE_LENGTH: f64 = ATTACK + HOLD + RELEASE;

pub const FREQ_MIN: f32 = 20.0;
pub const FREQ_SPAN: f32 = 600.0;
/// Gap between notes at the far left. Divided by `INTERVAL_BASE^x`.
pub const INTERVAL_MAX: f64 = 0.25;
pub const INTERVAL_BASE: f64 = 50.0;
pub const CUTOFF_MIN: f32 = 400.0;
pub const CUTOFF_SPAN: f32 = 400.0;
/// Resonance in dB at the top edge.
pub const Q_MAX: f32 = 18.0;

/// What a pointer position means to this synth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    pub freq: f32,
    pub interval: f64,
    pub cutoff: f32,
    pub q: f32,
}

pub fn params(at: Point) -> Params {
    Params {
        freq: FREQ_MIN + FREQ_SPAN * (1.0 - at.x),
        interval: INTERVAL_MAX / INTERVAL_BASE.powf(at.x as f64),
        cutoff: CUTOFF_MIN + CUTOFF_SPAN * at.y,
        q: Q_MAX * at.y,
    }
}

#[derive(Debug, Clone, Copy)]
struct Note {
    osc: NodeId,
    time: f64,
    end: f64,
}

pub struct Minimalism {
    filter: NodeId,
    params: Params,
    task: Task,
    queued: Option<Note>,
    last_note_end: Option<f64>,
    notes: Owned,
}

impl Minimalism {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let filter = ctx.audio.filter(FilterType::LowPass, CUTOFF_MIN, 0.0);
        ctx.audio.connect(filter, ctx.audio.destination())?;
        Ok(Self {
            filter,
            params: params(Point::default()),
            task: Task::new(0),
            queued: None,
            last_note_end: None,
            notes: Owned::new(),
        })
    }

    pub fn params(&self) -> Params {
        self.params
    }

    /// Start time of the note waiting to play, if any.
    pub fn queued_time(&self) -> Option<f64> {
        self.queued.map(|n| n.time)
    }

    fn queue_note(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let now = ctx.now();
        let time = self
            .last_note_end
            .map_or(now, |end| end + self.params.interval)
            .max(now);
        let end = time + NOTE_LENGTH;

        let audio = &mut *ctx.audio;
        let osc = audio.oscillator(Waveform::Saw, self.params.freq);
        let gain = audio.gain(0.0);
        audio.chain(&[osc, gain, self.filter])?;
        audio
            .param(gain, ParamKind::Gain)?
            .set_value_at_time(0.0, time)
            .linear_ramp_to_value_at_time(GAIN, time + ATTACK)
            .set_value_at_time(GAIN, time + ATTACK + HOLD)
            .linear_ramp_to_value_at_time(0.0, end);
        audio.start(osc, time)?;
        audio.stop(osc, end)?;
        audio.free_on_end(&[osc], &[gain])?;

        self.notes.push(osc);
        self.queued = Some(Note { osc, time, end });
        self.task.set_next_time(time);
        ctx.wake_after(&mut self.task, time - now);
        Ok(())
    }

    /// Drop the queued note without letting it sound. A note that has
    /// already started is left to finish.
    fn cancel_queued(&mut self, ctx: &mut SynthCtx) {
        if let Some(note) = self.queued.take() {
            if note.time > ctx.now() {
                ctx.audio.release(&[note.osc]);
                self.notes.forget(note.osc);
            }
        }
        self.task.cancel(ctx.timers);
    }
}

impl Synth for Minimalism {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.update(ctx, at)
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.params = params(at);
        ctx.audio
            .param(self.filter, ParamKind::Frequency)?
            .set_value(self.params.cutoff);
        ctx.audio.param(self.filter, ParamKind::Q)?.set_value(self.params.q);

        let uncommitted = self.queued.is_some_and(|n| n.time > ctx.now());
        if uncommitted {
            self.cancel_queued(ctx);
        }
        if self.queued.is_none() {
            self.queue_note(ctx)?;
        }
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.cancel_queued(ctx);
        self.last_note_end = None;
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if !self.task.fired(timer) {
            return Ok(());
        }
        let now = ctx.now();
        match self.queued {
            // woke early: wait for the note to start
            Some(note) if note.time > now => {
                ctx.wake_after(&mut self.task, note.time - now);
            }
            Some(note) => {
                self.queued = None;
                self.last_note_end = Some(note.end);
                self.queue_note(ctx)?;
            }
            None => {}
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.notes.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.task.cancel(ctx.timers);
        self.queued = None;
        self.last_note_end = None;
        let freed = self.notes.release(ctx.audio) + ctx.audio.release(&[self.filter]);
        debug!(freed, "minimalism torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::testing::{pad, Rig};

    #[test]
    fn test_corners() {
        let slow = params(Point::new(0.0, 0.0));
        assert_eq!(slow.interval, INTERVAL_MAX);
        assert_eq!(slow.cutoff, CUTOFF_MIN);
        assert_eq!(slow.q, 0.0);

        let fast = params(Point::new(1.0, 1.0));
        assert!((fast.interval - INTERVAL_MAX / INTERVAL_BASE).abs() < 1e-12);
        assert_eq!(fast.cutoff, CUTOFF_MIN + CUTOFF_SPAN);
        assert_eq!(fast.q, Q_MAX);
    }

    #[test]
    fn test_filter_stays_in_range_across_the_pad() {
        let mut rig = Rig::new();
        let mut synth = Minimalism::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        for at in pad() {
            synth.update(&mut rig.ctx(), at).unwrap();
            let cutoff = rig.audio.param_ref(synth.filter, ParamKind::Frequency).unwrap();
            let cutoff = cutoff.value();
            assert!((CUTOFF_MIN..=CUTOFF_MIN + CUTOFF_SPAN).contains(&cutoff), "{at:?}: {cutoff}");
            let p = synth.params();
            assert!(p.freq >= FREQ_MIN && p.interval > 0.0, "{at:?}: {p:?}");
        }
        assert_eq!(rig.timers.len(), 1);
    }

    #[test]
    fn test_notes_are_spaced_by_the_interval() {
        let mut rig = Rig::new();
        let mut synth = Minimalism::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.0, 0.5)).unwrap();
        let first = synth.queued_time().unwrap();

        rig.run(&mut synth, NOTE_LENGTH);
        let second = synth.queued_time().unwrap();
        assert!((second - (first + NOTE_LENGTH + INTERVAL_MAX)).abs() < 1e-9);
    }

    #[test]
    fn test_update_replaces_the_queued_note() {
        let mut rig = Rig::new();
        let mut synth = Minimalism::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.0, 0.0)).unwrap();
        rig.run(&mut synth, 0.05);
        // the second note is now queued in the future
        let live = rig.audio.live_nodes();
        for i in 0..20 {
            synth
                .update(&mut rig.ctx(), Point::new(i as f32 / 20.0, 0.5))
                .unwrap();
        }
        assert_eq!(rig.audio.live_nodes(), live);
        assert_eq!(rig.timers.len(), 1);
    }

    #[test]
    fn test_only_one_note_waits_in_the_future() {
        let mut rig = Rig::new();
        let mut synth = Minimalism::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(1.0, 0.0)).unwrap();
        for _ in 0..40 {
            rig.run(&mut synth, 0.01);
            let now = rig.audio.current_time();
            let waiting = synth
                .notes
                .iter()
                .filter(|&osc| rig.audio.start_time(osc).is_some_and(|t| t > now))
                .count();
            assert!(waiting <= 1, "{waiting} notes queued ahead at {now}");
        }
    }

    #[test]
    fn test_end_and_teardown_leave_nothing() {
        let mut rig = Rig::new();
        let mut synth = Minimalism::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.7, 0.2)).unwrap();
        rig.run(&mut synth, 0.5);
        synth.end(&mut rig.ctx()).unwrap();
        synth.end(&mut rig.ctx()).unwrap();
        assert_eq!(rig.timers.len(), 0);

        rig.run(&mut synth, 0.2);
        assert_eq!(rig.audio.live_nodes(), 1);
        synth.teardown(&mut rig.ctx());
        synth.teardown(&mut rig.ctx());
        assert_eq!(rig.audio.live_nodes(), 0);
    }
}
