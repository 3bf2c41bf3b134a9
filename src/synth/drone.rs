//! A low sine and its tenth harmonic driven through a tangent shaper.
//!
//! The middle of the pad is the bottom of the drone; either edge raises it
//! by up to an octave. Height pushes the shaper curve towards its poles. The
//! curve also drifts slowly on its own, redrawn every tenth of a second.

use std::f32::consts::PI;

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::dsp::shaper::Curve;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

pub const GAIN: f32 = 0.15;
pub const RELEASE: f64 = 0.5;
pub const CURVE_POINTS: usize = 256;
pub const CURVE_REFRESH: f64 = 0.1;
pub const CUTOFF: f32 = 200.0;
pub const HARMONIC: f32 = 10.0;

const FREQ_BASE: f32 = 34.0;
/// One octave up from C1, in Hz.
const FREQ_SPAN: f32 = 65.41 - 32.7;

/// Fundamental for a horizontal position.
pub fn frequency(x: f32) -> f32 {
    let factor = ((0.6 - 1.2 * x).abs() - 0.1).max(0.0) * 2.0;
    FREQ_BASE + FREQ_SPAN * factor * 1.05
}

/// Tangent curve at audio time `t`. `factor` in [0, 1] moves the poles in.
pub fn curve(t: f64, factor: f32) -> Curve {
    let drift = 0.005 * (1.5 * t).sin() as f32;
    let k = 0.455 + drift + 0.03 * factor;
    Curve::from_fn(CURVE_POINTS, |x| (PI * x * k).tan())
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    osc: NodeId,
    saw: NodeId,
    shaper: NodeId,
    gain: NodeId,
}

pub struct Drone {
    filter: NodeId,
    voice: Option<Voice>,
    curve_factor: f32,
    refresh: Task,
    sources: Owned,
}

impl Drone {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let filter = ctx.audio.filter(FilterType::LowPass, CUTOFF, 0.0);
        ctx.audio.connect(filter, ctx.audio.destination())?;
        Ok(Self {
            filter,
            voice: None,
            curve_factor: 0.0,
            refresh: Task::new(0),
            sources: Owned::new(),
        })
    }

    pub fn is_sounding(&self) -> bool {
        self.voice.is_some()
    }

    fn refresh_curve(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        if let Some(voice) = self.voice {
            ctx.audio
                .set_curve(voice.shaper, curve(ctx.now(), self.curve_factor))?;
        }
        Ok(())
    }
}

impl Synth for Drone {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        let now = ctx.now();
        let audio = &mut *ctx.audio;
        let osc = audio.oscillator(Waveform::Sine, FREQ_BASE);
        let saw = audio.oscillator(Waveform::Saw, FREQ_BASE * HARMONIC);
        let shaper = audio.shaper(curve(now, at.y));
        let gain = audio.gain(GAIN);
        audio.chain(&[osc, shaper, gain, self.filter])?;
        audio.connect(saw, shaper)?;
        audio.start(osc, now)?;
        audio.start(saw, now)?;
        audio.free_on_end(&[osc, saw], &[shaper, gain])?;
        self.sources.push(osc);
        self.sources.push(saw);
        self.voice = Some(Voice {
            osc,
            saw,
            shaper,
            gain,
        });

        self.update(ctx, at)?;
        ctx.wake_after(&mut self.refresh, CURVE_REFRESH);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        let Some(voice) = self.voice else {
            return Ok(());
        };
        self.curve_factor = at.y;
        let freq = frequency(at.x);
        ctx.audio
            .param(voice.osc, ParamKind::Frequency)?
            .set_value(freq);
        ctx.audio
            .param(voice.saw, ParamKind::Frequency)?
            .set_value(freq * HARMONIC);
        Ok(())
    }

    /// Fade out over the release; the voice frees itself once stopped.
    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.refresh.cancel(ctx.timers);
        let Some(voice) = self.voice.take() else {
            return Ok(());
        };
        let now = ctx.now();
        let audio = &mut *ctx.audio;
        audio.stop(voice.osc, now + RELEASE)?;
        audio.stop(voice.saw, now + RELEASE)?;
        audio
            .param(voice.gain, ParamKind::Gain)?
            .set_value_at_time(GAIN, now)
            .linear_ramp_to_value_at_time(0.0, now + RELEASE);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if self.refresh.fired(timer) {
            self.refresh_curve(ctx)?;
            ctx.wake_after(&mut self.refresh, CURVE_REFRESH);
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.sources.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.refresh.cancel(ctx.timers);
        self.voice = None;
        self.sources.release(ctx.audio);
        ctx.audio.release(&[self.filter]);
    }
}
