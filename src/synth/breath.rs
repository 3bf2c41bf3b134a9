//! A guided 4-7-8 breath.
//!
//! Touching the pad starts one cycle: four notes of a minor pentatonic
//! chord enter a second apart while breathing in, swell back during the
//! hold, and fall away one by one while breathing out. Where the pad is
//! touched picks the chord.

use rand::Rng;

use crate::dsp::oscillator::Waveform;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::view::Snapshot;
use crate::sequencing::seed::{posmod, Bucket};
use crate::sequencing::theory::{midi_to_freq, minor_pentatonic, parse_note};
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

/// Seconds breathing in, holding and breathing out.
pub const PHASES: [f64; 3] = [4.0, 7.0, 8.0];
pub const PROMPTS: [&str; 3] = ["breathe in", "(hold...)", "breathe out"];
/// One note enters per second of breathing in.
pub const NOTES: usize = 4;
pub const QUANTIZE: u32 = 10;
pub const FADE: f64 = 0.1;

const MAX_GAIN: f32 = 0.5;
const ROOM_SIZE: f32 = 0.98;
const DAMPENING: f32 = 5000.0;
const WET: f32 = 0.1;

const PHASE_TAG: u32 = 0;

/// Chord frequencies for a pointer position.
pub fn chord(at: Point) -> Result<[f32; NOTES], SynthError> {
    let mut rng = Bucket::new("breath")
        .axis(at.x, QUANTIZE)
        .axis(at.y, QUANTIZE)
        .rng();
    let octave = if rng.gen::<i32>() > 0 { 3 } else { 4 };
    let root = if rng.gen::<i32>() > 0 { "C" } else { "F" };
    let scale = minor_pentatonic(parse_note(&format!("{root}{octave}"))?)?;

    let len = scale.len() as i64;
    let mut idx = 0i64;
    let mut notes = [0.0; NOTES];
    for note in &mut notes {
        let skip = (rng.gen::<f64>() * len as f64 / 3.0).floor() as i64;
        idx = posmod(idx + 1 + skip, len);
        *note = midi_to_freq(scale[idx as usize]);
    }
    Ok(notes)
}

fn cycle_length() -> f64 {
    PHASES.iter().sum()
}

/// A voice gain fading out after its gesture ended.
#[derive(Debug, Clone)]
struct Fade {
    gain: NodeId,
    task: Task,
}

pub struct Breath {
    reverb: NodeId,
    voice: Option<NodeId>,
    notes: [f32; NOTES],
    phase: Option<usize>,
    phase_task: Task,
    fades: Vec<Fade>,
    next_fade_tag: u32,
    oscs: Owned,
}

impl Breath {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let audio = &mut *ctx.audio;
        let reverb = audio.reverb();
        audio.param(reverb, ParamKind::RoomSize)?.set_value(ROOM_SIZE);
        audio.param(reverb, ParamKind::Dampening)?.set_value(DAMPENING);
        audio.param(reverb, ParamKind::Wet)?.set_value(WET);
        audio.connect(reverb, audio.destination())?;
        Ok(Self {
            reverb,
            voice: None,
            notes: chord(Point::default())?,
            phase: None,
            phase_task: Task::new(PHASE_TAG),
            fades: Vec::new(),
            next_fade_tag: PHASE_TAG + 1,
            oscs: Owned::new(),
        })
    }

    /// Index into [`PHASES`] of the phase in progress.
    pub fn phase(&self) -> Option<usize> {
        self.phase
    }

    fn breathe_in(&mut self, ctx: &mut SynthCtx, voice: NodeId) -> Result<(), SynthError> {
        let now = ctx.now();
        let stop = now + cycle_length() + 1.0;
        for (i, &freq) in self.notes.iter().enumerate() {
            let t = now + i as f64;
            let target = (0.2 + 0.04 * i as f32) * MAX_GAIN;
            let pan = ctx.rng.gen::<f32>() - 0.5;

            let audio = &mut *ctx.audio;
            let osc = audio.oscillator(Waveform::Sine, freq);
            let panner = audio.panner(pan);
            let gain = audio.gain(0.0);
            audio.chain(&[osc, panner, gain, voice])?;
            let level = audio.param(gain, ParamKind::Gain)?;
            level
                .set_value_at_time(0.0, t)
                .linear_ramp_to_value_at_time(target, t + 0.01)
                .set_value_at_time(target, t + 0.5)
                .linear_ramp_to_value_at_time(0.0, t + 1.5);
            if i == NOTES - 1 {
                // the last note carries the hold
                let t = now + PHASES[0] + PHASES[1];
                level
                    .set_value_at_time(0.001, t)
                    .exponential_ramp_to_value_at_time(0.7 * target, t + 5.96)
                    .linear_ramp_to_value_at_time(0.0, t + 6.0);
            } else {
                // the others return one by one, last in first out
                let t = now + PHASES[0] + PHASES[1] + 4.0 + (NOTES - i) as f64;
                level
                    .set_value_at_time(0.0, t - 1.5)
                    .linear_ramp_to_value_at_time(0.9 * target, t - 0.05)
                    .linear_ramp_to_value_at_time(0.0, t + 0.25);
            }
            audio.start(osc, t)?;
            audio.stop(osc, stop)?;
            audio.free_on_end(&[osc], &[panner, gain])?;
            self.oscs.push(osc);
        }
        Ok(())
    }

    fn next_phase(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let idx = self.phase.map_or(0, |p| p + 1);
        if idx >= PHASES.len() {
            self.phase = None;
            return Ok(());
        }
        self.phase = Some(idx);
        if idx == 0 {
            if let Some(voice) = self.voice {
                self.breathe_in(ctx, voice)?;
            }
        }
        ctx.publish(Snapshot::Breath {
            prompt: PROMPTS[idx],
        });
        ctx.wake_after(&mut self.phase_task, PHASES[idx]);
        Ok(())
    }
}

impl Synth for Breath {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.phase_task.cancel(ctx.timers);
        self.phase = None;
        if let Some(old) = self.voice.take() {
            ctx.audio.release(&[old]);
        }
        let voice = ctx.audio.gain(1.0);
        ctx.audio.connect(voice, self.reverb)?;
        self.voice = Some(voice);
        self.update(ctx, at)?;
        self.next_phase(ctx)
    }

    /// Picks the chord for the next cycle.
    fn update(&mut self, _ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.notes = chord(at)?;
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.phase_task.cancel(ctx.timers);
        self.phase = None;
        let now = ctx.now();
        self.oscs.stop_all(ctx.audio, now + FADE);
        if let Some(gain) = self.voice.take() {
            ctx.audio
                .param(gain, ParamKind::Gain)?
                .linear_ramp_to_value_at_time(0.0, now + FADE);
            let mut task = Task::new(self.next_fade_tag);
            self.next_fade_tag += 1;
            ctx.wake_after(&mut task, FADE);
            self.fades.push(Fade { gain, task });
        }
        ctx.publish(Snapshot::Cleared);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if self.phase_task.fired(timer) {
            return self.next_phase(ctx);
        }
        if let Some(i) = self.fades.iter_mut().position(|f| f.task.fired(timer)) {
            let fade = self.fades.swap_remove(i);
            ctx.audio.release(&[fade.gain]);
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.oscs.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.phase_task.cancel(ctx.timers);
        self.phase = None;
        self.oscs.release(ctx.audio);
        let mut gains: Vec<NodeId> = self.voice.take().into_iter().collect();
        for mut fade in self.fades.drain(..) {
            fade.task.cancel(ctx.timers);
            gains.push(fade.gain);
        }
        gains.push(self.reverb);
        ctx.audio.release(&gains);
    }
}
