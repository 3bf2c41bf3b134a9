//! An eight-step drum machine that also plays its own volume knob.
//!
//! The pattern comes from which quarter of the pad the pointer is in. A
//! second transport plays the same pattern five times slower into the gain
//! of the first, so the hits swell and duck in a slower rhythm of their own.
//! Up speeds everything up and hands more of the level to that second
//! rhythm.

use rand::Rng;

use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{AudioBuffer, NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::loader::{AssetRequest, LoadedAssets};
use crate::sequencing::seed::{posmod, Bucket};
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

pub const GROUP: &str = "drums";
pub const BEAT_LENGTH: usize = 8;
/// Each transport wakes this often and schedules two periods ahead.
pub const SCHEDULE_PERIOD: f64 = 0.05;
/// The gain transport runs this many times slower.
pub const RECURSE_FACTOR: f64 = 5.0;
pub const QUANTIZE: u32 = 4;

pub fn note_interval(y: f32) -> f64 {
    1.0 / (7.0 + 40.0 * y as f64)
}

/// Sample number per step, `0` for a rest. Depends only on the quarter of
/// the pad `x` falls in.
pub fn beat(x: f32, samples: usize) -> Vec<usize> {
    let mut rng = Bucket::new(GROUP).axis(x, QUANTIZE).rng();
    (0..BEAT_LENGTH)
        .map(|_| {
            if rng.gen::<i32>() > 0 {
                0
            } else {
                posmod(rng.gen::<i32>() as i64, samples as i64 + 1) as usize
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Output,
    Level,
}

#[derive(Debug, Clone)]
struct Transport {
    factor: f64,
    target: Target,
    step: usize,
    task: Task,
}

impl Transport {
    fn new(tag: u32, factor: f64, target: Target) -> Self {
        Self {
            factor,
            target,
            step: 0,
            task: Task::new(tag),
        }
    }
}

pub struct Drums {
    samples: Vec<AudioBuffer>,
    transport_gain: Option<NodeId>,
    beat: Vec<usize>,
    note_interval: f64,
    transports: [Transport; 2],
    sources: Owned,
}

impl Drums {
    pub fn new(_ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        Ok(Self {
            samples: Vec::new(),
            transport_gain: None,
            beat: vec![0; BEAT_LENGTH],
            note_interval: note_interval(0.0),
            transports: [
                Transport::new(0, 1.0, Target::Output),
                Transport::new(1, RECURSE_FACTOR, Target::Level),
            ],
            sources: Owned::new(),
        })
    }

    pub fn beat(&self) -> &[usize] {
        &self.beat
    }

    /// Schedule every hit of transport `t` due before the end of the next
    /// two periods, then wake again in one.
    fn schedule(&mut self, ctx: &mut SynthCtx, t: usize) -> Result<(), SynthError> {
        let Some(transport_gain) = self.transport_gain else {
            return Ok(());
        };
        let horizon = ctx.now() + 2.0 * SCHEDULE_PERIOD;
        let interval = self.note_interval * self.transports[t].factor;
        let target = self.transports[t].target;

        let mut time = self.transports[t].task.next_time();
        while time < horizon {
            let step = self.transports[t].step;
            let note = self.beat[step % BEAT_LENGTH];
            if let Some(buffer) = note.checked_sub(1).and_then(|i| self.samples.get(i)) {
                let audio = &mut *ctx.audio;
                let source = audio.buffer_source(buffer.clone());
                match target {
                    Target::Output => audio.connect(source, transport_gain)?,
                    Target::Level => audio.connect_param(source, transport_gain, ParamKind::Gain)?,
                }
                audio.start(source, time)?;
                audio.free_on_end(&[source], &[])?;
                self.sources.push(source);
            }
            time += interval;
            self.transports[t].step = step + 1;
        }

        let transport = &mut self.transports[t];
        transport.task.set_next_time(time);
        ctx.wake_after(&mut transport.task, SCHEDULE_PERIOD);
        Ok(())
    }
}

impl Synth for Drums {
    fn assets(&self) -> Option<AssetRequest> {
        Some(AssetRequest::new().group(GROUP, (1..=5).map(|i| format!("drum/drum{i}.wav"))))
    }

    fn install(&mut self, _ctx: &mut SynthCtx, assets: LoadedAssets) -> Result<(), SynthError> {
        self.samples = assets
            .group(GROUP)
            .filter(|g| !g.is_empty())
            .ok_or_else(|| SynthError::MissingAsset(GROUP.to_string()))?
            .to_vec();
        Ok(())
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        if self.samples.is_empty() {
            return Ok(());
        }
        if let Some(old) = self.transport_gain.take() {
            ctx.audio.release(&[old]);
        }
        let gain = ctx.audio.gain(1.0);
        ctx.audio.connect(gain, ctx.audio.destination())?;
        self.transport_gain = Some(gain);
        self.update(ctx, at)?;

        let now = ctx.now();
        for t in 0..self.transports.len() {
            self.transports[t].step = 0;
            self.transports[t].task.set_next_time(now);
            self.schedule(ctx, t)?;
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.note_interval = note_interval(at.y);
        self.beat = beat(at.x, self.samples.len());
        if let Some(gain) = self.transport_gain {
            ctx.audio.param(gain, ParamKind::Gain)?.set_value(1.0 - at.y);
        }
        Ok(())
    }

    /// Cut everything off: hits already queued are dropped with the
    /// transport gain.
    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        for transport in &mut self.transports {
            transport.task.cancel(ctx.timers);
        }
        self.sources.release(ctx.audio);
        if let Some(gain) = self.transport_gain.take() {
            ctx.audio.release(&[gain]);
        }
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        match self.transports.iter_mut().position(|t| t.task.fired(timer)) {
            Some(t) => self.schedule(ctx, t),
            None => Ok(()),
        }
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.sources.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        for transport in &mut self.transports {
            transport.task.cancel(ctx.timers);
        }
        self.sources.release(ctx.audio);
        if let Some(gain) = self.transport_gain.take() {
            ctx.audio.release(&[gain]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::loader::{AssetLoader, SynthesizedLoader};
    use crate::synth::testing::{pad, Rig};

    fn loaded(rig: &mut Rig) -> Drums {
        let mut synth = Drums::new(&mut rig.ctx()).unwrap();
        let request = synth.assets().unwrap();
        let assets = SynthesizedLoader::new(8_000.0, 5).load(&request).unwrap();
        synth.install(&mut rig.ctx(), assets).unwrap();
        synth
    }

    #[test]
    fn test_beat_is_eight_steps_per_quarter() {
        let a = beat(0.49, 5);
        assert_eq!(a.len(), BEAT_LENGTH);
        assert!(a.iter().all(|&n| n <= 5));
        assert_eq!(a, beat(0.51, 5));
    }

    #[test]
    fn test_note_interval_corners() {
        assert!((note_interval(0.0) - 1.0 / 7.0).abs() < 1e-12);
        assert!((note_interval(1.0) - 1.0 / 47.0).abs() < 1e-12);
    }

    #[test]
    fn test_start_without_samples_is_a_no_op() {
        let mut rig = Rig::new();
        let mut synth = Drums::new(&mut rig.ctx()).unwrap();
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        assert!(rig.timers.is_empty());
        assert_eq!(rig.audio.live_nodes(), 0);
    }

    #[test]
    fn test_transports_schedule_hits_and_end_cuts_them() {
        let mut rig = Rig::new();
        let mut synth = loaded(&mut rig);
        let x = [0.0, 0.25, 0.5, 0.75, 1.0]
            .into_iter()
            .find(|&x| beat(x, 5).iter().any(|&n| n > 0))
            .unwrap();
        synth.start(&mut rig.ctx(), Point::new(x, 1.0)).unwrap();
        assert_eq!(rig.timers.len(), 2);

        rig.run(&mut synth, 0.5);
        assert_eq!(rig.timers.len(), 2);
        assert!(rig.audio.live_nodes() > 1);

        synth.end(&mut rig.ctx()).unwrap();
        assert!(rig.timers.is_empty());
        assert_eq!(rig.audio.live_nodes(), 0);
    }

    #[test]
    fn test_transport_gain_stays_in_range_across_the_pad() {
        let mut rig = Rig::new();
        let mut synth = loaded(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();
        let gain = synth.transport_gain.unwrap();
        for at in pad() {
            synth.update(&mut rig.ctx(), at).unwrap();
            let level = rig.audio.param_ref(gain, ParamKind::Gain).unwrap().value();
            assert!((0.0..=1.0).contains(&level), "{at:?}: {level}");
            assert!((1.0 / 47.0..=1.0 / 7.0).contains(&synth.note_interval), "{at:?}");
        }
    }

    #[test]
    fn test_step_times_strictly_increase() {
        let mut rig = Rig::new();
        let mut synth = loaded(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.5, 0.5)).unwrap();

        let mut last = [(0usize, 0.0f64); 2];
        for _ in 0..100 {
            rig.run(&mut synth, 0.02);
            let now = rig.audio.current_time();
            for (t, transport) in synth.transports.iter().enumerate() {
                let (step, time) = (transport.step, transport.task.next_time());
                let interval = note_interval(0.5) * transport.factor;
                assert!((time - step as f64 * interval).abs() < 1e-6, "{t}: {step} at {time}");
                assert!(time > now);
                assert!(step >= last[t].0);
                if step > last[t].0 {
                    assert!(time > last[t].1);
                }
                last[t] = (step, time);
            }
        }
        assert!(last[0].0 > 50, "{last:?}");
        assert!(last[1].0 >= 10, "{last:?}");
    }

    #[test]
    fn test_level_transport_feeds_the_gain_param() {
        let mut rig = Rig::new();
        let mut synth = loaded(&mut rig);
        synth.start(&mut rig.ctx(), Point::new(0.0, 0.5)).unwrap();
        let gain = synth.transport_gain.unwrap();
        let level = rig.audio.param_ref(gain, ParamKind::Gain).unwrap();
        assert_eq!(level.value(), 0.5);
        // only the output transport connects to the gain's audio input
        let inputs = rig.audio.inputs(gain).unwrap().len();
        let hits = synth.sources.len();
        assert!(inputs <= hits);
    }
}
