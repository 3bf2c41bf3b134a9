//! Three detuned squares stepping up an arpeggio.
//!
//! Right raises the root, quickens the steps and opens the filter. Up bends
//! everything sharp (sounding notes included) and lengthens the arpeggio to
//! as many as ten steps.

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

const ATTACK: f64 = 0.01;
const RELEASE: f64 = 1.0;
const GAIN: f32 = 0.1;
/// Frequency multiples of the three oscillators in a step.
const FACTORS: [f32; 3] = [1.0, 1.01, 0.5];
const WIDTH: f32 = 1.0;
const INITIAL_CUTOFF: f32 = 8000.0;

pub const FREQ_MIN: f32 = 20.0;
pub const FREQ_SPAN: f32 = 110.0;
pub const BEND_SPAN: f32 = 110.0;
pub const MAX_STEPS: u32 = 10;
pub const INTERVAL_MAX: f64 = 0.06;
pub const INTERVAL_BASE: f64 = 5.0;
pub const CUTOFF_MIN: f32 = 440.0;
pub const CUTOFF_SPAN: f32 = 20_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    pub freq: f32,
    pub bend: f32,
    pub count: u32,
    pub interval: f64,
    pub cutoff: f32,
}

/// Cutoff is capped just below Nyquist.
pub fn params(at: Point, sample_rate: f32) -> Params {
    Params {
        freq: FREQ_MIN + FREQ_SPAN * at.x,
        bend: BEND_SPAN * at.y,
        count: 1 + ((MAX_STEPS - 1) as f32 * at.y).round() as u32,
        interval: INTERVAL_MAX / INTERVAL_BASE.powf(at.x as f64),
        cutoff: (CUTOFF_MIN + CUTOFF_SPAN * at.x).min(sample_rate * 0.5 * 0.999),
    }
}

/// A sounding oscillator and what its pitch was built from.
#[derive(Debug, Clone, Copy)]
struct Tone {
    osc: NodeId,
    factor: f32,
    freq: f32,
    index: u32,
}

impl Tone {
    fn pitch(&self, bend: f32) -> f32 {
        self.factor * (self.freq + bend) * (1.0 + WIDTH * self.index as f32)
    }
}

#[derive(Debug, Clone, Copy)]
struct Step {
    oscs: [NodeId; 3],
    time: f64,
    /// End of the hold; the release rings on past it.
    end: f64,
}

pub struct Arpeggiator {
    filter: NodeId,
    params: Params,
    index: u32,
    task: Task,
    queued: Option<Step>,
    last_step_end: Option<f64>,
    tones: Vec<Tone>,
    voices: Owned,
}

impl Arpeggiator {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let filter = ctx.audio.filter(FilterType::LowPass, INITIAL_CUTOFF, 0.0);
        ctx.audio.connect(filter, ctx.audio.destination())?;
        Ok(Self {
            filter,
            params: params(Point::default(), ctx.audio.sample_rate()),
            index: 0,
            task: Task::new(0),
            queued: None,
            last_step_end: None,
            tones: Vec::new(),
            voices: Owned::new(),
        })
    }

    pub fn params(&self) -> Params {
        self.params
    }

    pub fn queued_time(&self) -> Option<f64> {
        self.queued.map(|s| s.time)
    }

    fn queue_step(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let now = ctx.now();
        let time = self
            .last_step_end
            .map_or(now, |end| end + self.params.interval)
            .max(now);
        let end = time + ATTACK + self.params.interval;

        let mut oscs = [ctx.audio.destination(); 3];
        for (slot, factor) in oscs.iter_mut().zip(FACTORS) {
            let tone = Tone {
                osc: ctx.audio.oscillator(Waveform::Square, 0.0),
                factor,
                freq: self.params.freq,
                index: self.index,
            };
            let audio = &mut *ctx.audio;
            audio
                .param(tone.osc, ParamKind::Frequency)?
                .set_value(tone.pitch(self.params.bend));
            let gain = audio.gain(0.0);
            audio.chain(&[tone.osc, gain, self.filter])?;
            audio
                .param(gain, ParamKind::Gain)?
                .set_value_at_time(0.0, time)
                .linear_ramp_to_value_at_time(GAIN, time + ATTACK)
                .set_value_at_time(GAIN, end)
                .linear_ramp_to_value_at_time(0.0, end + RELEASE);
            audio.start(tone.osc, time)?;
            audio.stop(tone.osc, end + RELEASE)?;
            audio.free_on_end(&[tone.osc], &[gain])?;

            self.voices.push(tone.osc);
            self.tones.push(tone);
            *slot = tone.osc;
        }

        self.queued = Some(Step { oscs, time, end });
        self.task.set_next_time(time);
        ctx.wake_before(&mut self.task, end);
        Ok(())
    }

    fn cancel_queued(&mut self, ctx: &mut SynthCtx) {
        if let Some(step) = self.queued.take() {
            ctx.audio.release(&step.oscs);
            for osc in step.oscs {
                self.forget(osc);
            }
        }
        self.task.cancel(ctx.timers);
    }

    fn forget(&mut self, osc: NodeId) {
        self.voices.forget(osc);
        self.tones.retain(|t| t.osc != osc);
    }
}

impl Synth for Arpeggiator {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.update(ctx, at)
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.params = params(at, ctx.audio.sample_rate());
        ctx.audio
            .param(self.filter, ParamKind::Frequency)?
            .set_value(self.params.cutoff);

        for tone in &self.tones {
            if let Ok(freq) = ctx.audio.param(tone.osc, ParamKind::Frequency) {
                freq.set_value(tone.pitch(self.params.bend));
            }
        }

        let uncommitted = self.queued.is_some_and(|s| s.time > ctx.now());
        if uncommitted {
            self.cancel_queued(ctx);
        }
        if self.queued.is_none() {
            self.queue_step(ctx)?;
        }
        Ok(())
    }

    /// Sounding and queued steps ring out.
    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.task.cancel(ctx.timers);
        self.queued = None;
        self.last_step_end = None;
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if !self.task.fired(timer) {
            return Ok(());
        }
        if let Some(step) = self.queued.take() {
            self.last_step_end = Some(step.end);
            self.index = (self.index + 1) % self.params.count.max(1);
            self.queue_step(ctx)?;
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.task.cancel(ctx.timers);
        self.queued = None;
        self.tones.clear();
        self.voices.release(ctx.audio);
        ctx.audio.release(&[self.filter]);
    }
}
