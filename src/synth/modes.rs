//! A four-note figure climbing through a church mode.
//!
//! Left to right walks the seven modes, bottom to top raises the root in
//! thirds. The mode and root only change when the figure comes back round
//! to its first note, so a phrase is never cut in half, and a new gesture
//! picks the figure up where the last one let go. Height also bends the
//! pitch a little, sounding notes included, and the figure pans with x.

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::view::Snapshot;
use crate::sequencing::theory::{midi_to_freq, parse_note, transpose, Mode};
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

/// Gap before each note of the figure, indexed by the note about to play.
pub const INTERVALS: [f64; 4] = [0.15, 0.15, 0.05, 0.2];
pub const LOWEST_ROOT: &str = "A1";

const ATTACK: f64 = 0.001;
const HOLD: f64 = 0.05;
const RELEASE: f64 = 1.5;
const GAIN: f32 = 0.25;
const CUTOFF: f32 = 1000.0;

/// MIDI note `idx` steps into the figure on `base` in `mode`: the root,
/// then a third, fifth and seventh stacked over rising octaves.
pub fn pitch(base: u8, mode: Mode, idx: usize) -> Result<u8, SynthError> {
    let octaves = 12 * idx.min(2) as i32;
    let step = if idx > 0 { mode.steps()[idx * 2] as i32 } else { 0 };
    Ok(transpose(base as i32, octaves + step)?)
}

/// Mode and root a pointer position selects.
pub fn selection(at: Point) -> Result<(Mode, u8), SynthError> {
    let mode = Mode::from_index((7.0 * at.x).floor() as usize);
    let lowest = parse_note(LOWEST_ROOT)?;
    let degree = (5.0 * at.y).floor() as usize * 3;
    Ok((mode, transpose(lowest as i32, mode.degree(degree))?))
}

fn bend(at: Point) -> f32 {
    0.95 + 0.1 * at.y
}

#[derive(Debug, Clone, Copy)]
struct Sounding {
    osc: NodeId,
    freq: f32,
}

pub struct Modes {
    filter: NodeId,
    panner: NodeId,
    mode: Mode,
    base: u8,
    next_mode: Mode,
    next_base: u8,
    bend: f32,
    idx: usize,
    task: Task,
    sounding: Vec<Sounding>,
    notes: Owned,
}

impl Modes {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let audio = &mut *ctx.audio;
        let filter = audio.filter(FilterType::LowPass, CUTOFF, 0.0);
        let panner = audio.panner(0.0);
        audio.chain(&[filter, panner, audio.destination()])?;
        let (mode, base) = selection(Point::default())?;
        Ok(Self {
            filter,
            panner,
            mode,
            base,
            next_mode: mode,
            next_base: base,
            bend: bend(Point::default()),
            idx: 0,
            task: Task::new(0),
            sounding: Vec::new(),
            notes: Owned::new(),
        })
    }

    /// The mode currently playing.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    fn note(&mut self, ctx: &mut SynthCtx, time: f64) -> Result<(), SynthError> {
        if self.idx == 0 {
            self.mode = self.next_mode;
            self.base = self.next_base;
            ctx.publish(Snapshot::Mode {
                name: self.mode.name(),
            });
        }
        let freq = midi_to_freq(pitch(self.base, self.mode, self.idx)?);
        let end = time + ATTACK + HOLD + RELEASE;

        let audio = &mut *ctx.audio;
        let osc = audio.oscillator(Waveform::Saw, freq * self.bend);
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
        self.sounding.push(Sounding { osc, freq });
        Ok(())
    }
}

impl Synth for Modes {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.update(ctx, at)?;
        let now = ctx.now();
        self.task.set_next_time(now);
        ctx.wake_before(&mut self.task, now);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        (self.next_mode, self.next_base) = selection(at)?;
        self.bend = bend(at);
        ctx.audio
            .param(self.panner, ParamKind::Pan)?
            .set_value(0.5 * at.x - 0.25);
        for note in &self.sounding {
            if let Ok(freq) = ctx.audio.param(note.osc, ParamKind::Frequency) {
                freq.set_value(note.freq * self.bend);
            }
        }
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.task.cancel(ctx.timers);
        ctx.publish(Snapshot::Cleared);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if !self.task.fired(timer) {
            return Ok(());
        }
        self.note(ctx, self.task.next_time())?;
        self.idx = (self.idx + 1) % INTERVALS.len();
        let next = self.task.advance(INTERVALS[self.idx]);
        ctx.wake_before(&mut self.task, next);
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.notes.forget(node);
        self.sounding.retain(|n| n.osc != node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.task.cancel(ctx.timers);
        self.sounding.clear();
        self.notes.release(ctx.audio);
        ctx.audio.release(&[self.filter, self.panner]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::testing::{pad, Rig};

    #[test]
    fn test_figure_climbs_root_third_fifth_seventh() {
        let base = parse_note("A2").unwrap();
        let notes: Vec<u8> = (0..4).map(|i| pitch(base, Mode::Ionian, i).unwrap()).collect();
        assert_eq!(notes, vec![base, base + 16, base + 31, base + 35]);
    }

    #[test]
    fn test_selection_corners() {
        assert_eq!(selection(Point::new(0.0, 0.0)).unwrap(), (Mode::Ionian, 33));
        let (mode, base) = selection(Point::new(1.0, 1.0)).unwrap();
        assert_eq!(mode, Mode::Locrian);
        // fifteenth degree: two octaves and a second
        assert_eq!(base, 33 + 24 + 1);
    }

    #[test]
    fn test_mode_latches_at_the_top_of_the_figure() {
        let mut rig = Rig::new();
        let mut synth = Modes::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.0, 0.0)).unwrap();
        rig.run(&mut synth, 0.01);
        assert_eq!(rig.view.take(), Some(Snapshot::Mode { name: "ionian" }));

        synth.update(&mut rig.ctx(), Point::new(0.99, 0.0)).unwrap();
        rig.run(&mut synth, 0.3);
        assert_eq!(synth.mode(), Mode::Ionian);

        // the figure wraps at 0.55s
        rig.run(&mut synth, 0.4);
        assert_eq!(synth.mode(), Mode::Locrian);
        assert_eq!(rig.view.take(), Some(Snapshot::Mode { name: "locrian" }));
    }

    #[test]
    fn test_pan_stays_in_range_across_the_pad() {
        let mut rig = Rig::new();
        let mut synth = Modes::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        for at in pad() {
            synth.update(&mut rig.ctx(), at).unwrap();
            let pan = rig.audio.param_ref(synth.panner, ParamKind::Pan).unwrap().value();
            assert!((-0.25..=0.25).contains(&pan), "{at:?}: {pan}");
            assert!((0.95..=1.05).contains(&synth.bend), "{at:?}");
        }
    }

    #[test]
    fn test_note_times_strictly_increase() {
        let mut rig = Rig::new();
        let mut synth = Modes::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.3, 0.7)).unwrap();

        // fire every wake-up as soon as it is armed
        let mut times = vec![synth.task.next_time()];
        for _ in 0..64 {
            let timer = rig.timers.pop_due(f64::INFINITY).unwrap();
            synth.on_timer(&mut rig.ctx(), &timer).unwrap();
            times.push(synth.task.next_time());
        }
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");
        let figure: f64 = INTERVALS.iter().sum();
        assert!((times[64] - times[0] - 16.0 * figure).abs() < 1e-9);
    }

    #[test]
    fn test_next_gesture_continues_the_figure() {
        let mut rig = Rig::new();
        let mut synth = Modes::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.0, 0.0)).unwrap();
        // two notes queued, the third not yet
        rig.run(&mut synth, 0.07);
        assert_eq!(synth.idx, 2);
        synth.end(&mut rig.ctx()).unwrap();

        synth.start(&mut rig.ctx(), Point::new(0.99, 0.0)).unwrap();
        rig.run(&mut synth, 0.01);
        assert_eq!(synth.idx, 3);
        // mid-figure, so the new mode waits for the top
        assert_eq!(synth.mode(), Mode::Ionian);
    }

    #[test]
    fn test_end_stops_the_figure_and_notes_ring_out() {
        let mut rig = Rig::new();
        let mut synth = Modes::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.4, 0.4)).unwrap();
        rig.run(&mut synth, 0.2);
        synth.end(&mut rig.ctx()).unwrap();
        assert_eq!(rig.timers.len(), 0);
        assert_eq!(rig.view.take(), Some(Snapshot::Cleared));

        rig.run(&mut synth, 2.0);
        assert_eq!(rig.audio.live_nodes(), 2);
        synth.teardown(&mut rig.ctx());
        assert_eq!(rig.audio.live_nodes(), 0);
    }
}
