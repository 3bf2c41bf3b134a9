//! Rain on a tin roof: a steady patter of tiny sine blips.
//!
//! Each drop is a few milliseconds of a random pitch through a random
//! bandpass, panned somewhere across the field and bent through a fixed
//! noisy shaper. Right makes the patter denser; up opens the room around it.

use rand::Rng;
use tracing::trace;

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::dsp::shaper::Curve;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::view::Snapshot;
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

/// Longest drop, in seconds.
pub const DURATION: f64 = 0.0025;
pub const GAIN: f32 = 1.0;
/// Shortest wait between drops. Keeps a run of tiny random waits from
/// spinning the timer loop.
pub const MIN_GAP: f64 = 0.0005;
pub const RESTING_ROOM: f32 = 0.8;

const CURVE_POINTS: usize = 256;

/// Mean gap between drops in milliseconds: 40 at the left edge, 10 at the
/// right.
pub fn interval_ms(x: f32) -> f64 {
    10.0 + 30.0 * (1.0 - x as f64)
}

pub fn room_size(y: f32) -> f32 {
    0.9 + 0.099 * (1.0 - (1.0 - y).powi(3))
}

pub struct Percolator {
    shaper: NodeId,
    notch: NodeId,
    reverb: NodeId,
    tail_notch: NodeId,
    interval_ms: f64,
    task: Task,
    drops: Owned,
}

impl Percolator {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let curve = {
            let rng = &mut *ctx.rng;
            Curve::from_fn(CURVE_POINTS, |x| x * rng.gen::<f32>())
        };
        let audio = &mut *ctx.audio;
        let dest = audio.destination();
        let shaper = audio.shaper(curve);
        let notch = audio.filter(FilterType::Notch, 500.0, 0.5);
        let reverb = audio.reverb();
        let tail_notch = audio.filter(FilterType::Notch, 500.0, 0.1);
        audio.param(reverb, ParamKind::Dampening)?.set_value(20_000.0);
        audio.param(reverb, ParamKind::Dry)?.set_value(0.0);
        audio.param(reverb, ParamKind::Wet)?.set_value(0.1);
        audio.param(reverb, ParamKind::RoomSize)?.set_value(RESTING_ROOM);
        audio.chain(&[shaper, notch, dest])?;
        audio.chain(&[shaper, reverb, tail_notch, dest])?;
        Ok(Self {
            shaper,
            notch,
            reverb,
            tail_notch,
            interval_ms: interval_ms(0.0),
            task: Task::new(0),
            drops: Owned::new(),
        })
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    fn spawn_drop(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let now = ctx.now();
        let rng = &mut *ctx.rng;
        let freq = 200.0 + 5000.0 * rng.gen::<f32>();
        let band = 500.0 + 2000.0 * rng.gen::<f32>();
        let pan = -0.5 + rng.gen::<f32>();
        let duration = DURATION * rng.gen::<f64>();
        let peak = GAIN * (1.0 - rng.gen::<f32>().powi(2));

        let audio = &mut *ctx.audio;
        let osc = audio.oscillator(Waveform::Sine, freq);
        let gain = audio.gain(0.0);
        let filter = audio.filter(FilterType::BandPass, band, 5.0);
        let panner = audio.panner(pan);
        audio.chain(&[osc, gain, filter, panner, self.shaper])?;
        audio
            .param(gain, ParamKind::Gain)?
            .set_value_at_time(0.0, now)
            .linear_ramp_to_value_at_time(peak, now + duration / 4.0)
            .linear_ramp_to_value_at_time(0.0, now + duration);
        audio.start(osc, now)?;
        audio.stop(osc, now + duration)?;
        audio.free_on_end(&[osc], &[gain, filter, panner])?;
        self.drops.push(osc);
        trace!(freq, pan, duration, "drop");

        ctx.publish(Snapshot::Drop { pan });
        Ok(())
    }

    /// One drop, then wait a random fraction of the interval for the next.
    fn patter(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.spawn_drop(ctx)?;
        let wait = (ctx.rng.gen::<f64>() * self.interval_ms / 1000.0).max(MIN_GAP);
        ctx.wake_after(&mut self.task, wait);
        let tail = 500.0 + 100.0 * ctx.rng.gen::<f32>();
        ctx.audio
            .param(self.tail_notch, ParamKind::Frequency)?
            .set_value(tail);
        Ok(())
    }
}

impl Synth for Percolator {
    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.update(ctx, at)?;
        self.patter(ctx)
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.interval_ms = interval_ms(at.x);
        ctx.audio
            .param(self.reverb, ParamKind::RoomSize)?
            .set_value(room_size(at.y));
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.task.cancel(ctx.timers);
        ctx.audio
            .param(self.reverb, ParamKind::RoomSize)?
            .set_value(RESTING_ROOM);
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if self.task.fired(timer) {
            self.patter(ctx)?;
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.drops.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.task.cancel(ctx.timers);
        self.drops.release(ctx.audio);
        ctx.audio
            .release(&[self.shaper, self.notch, self.reverb, self.tail_notch]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::testing::{pad, Rig};

    const PERSISTENT: usize = 4;

    #[test]
    fn test_mappings() {
        assert_eq!(interval_ms(0.0), 40.0);
        assert_eq!(interval_ms(1.0), 10.0);
        assert!((room_size(0.0) - 0.9).abs() < 1e-6);
        assert!((room_size(1.0) - 0.999).abs() < 1e-6);
    }

    #[test]
    fn test_room_stays_in_range_across_the_pad() {
        let mut rig = Rig::new();
        let mut synth = Percolator::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        for at in pad() {
            synth.update(&mut rig.ctx(), at).unwrap();
            let room = rig.audio.param_ref(synth.reverb, ParamKind::RoomSize).unwrap().value();
            assert!((0.9 - 1e-6..=0.999 + 1e-6).contains(&room), "{at:?}: {room}");
            assert!((10.0..=40.0).contains(&synth.interval_ms()), "{at:?}");
        }
    }

    #[test]
    fn test_drops_keep_falling_and_free_themselves() {
        let mut rig = Rig::new();
        let mut synth = Percolator::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(1.0, 0.5)).unwrap();
        assert!(matches!(rig.view.take(), Some(Snapshot::Drop { .. })));

        rig.run(&mut synth, 0.5);
        assert_eq!(rig.timers.len(), 1);
        assert!(rig.view.is_dirty());
        // drops last a few milliseconds at most
        assert!(synth.drops.len() <= 3);
        assert!(rig.audio.live_nodes() <= PERSISTENT + 4 * 3);
    }

    #[test]
    fn test_end_stops_the_patter() {
        let mut rig = Rig::new();
        let mut synth = Percolator::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 1.0)).unwrap();
        rig.run(&mut synth, 0.2);
        synth.end(&mut rig.ctx()).unwrap();
        assert!(rig.timers.is_empty());
        let room = rig.audio.param_ref(synth.reverb, ParamKind::RoomSize).unwrap();
        assert_eq!(room.value(), RESTING_ROOM);

        rig.run(&mut synth, 0.05);
        assert_eq!(rig.audio.live_nodes(), PERSISTENT);
        synth.teardown(&mut rig.ctx());
        assert_eq!(rig.audio.live_nodes(), 0);
    }
}
