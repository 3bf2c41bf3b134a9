//! Musique concrète: a field recording cut up by the pointer.
//!
//! A pulse jumps the recording to one of 32 cue points and lets it loop
//! until the next pulse. The order of cues is drawn from the pointer's grid
//! cell, so holding still repeats a pattern and moving finds new ones. Up
//! speeds the pulse and drowns it in reverb; right darkens everything.

use std::f32::consts::PI;

use rand::Rng;

use crate::dsp::filter::FilterType;
use crate::engine::scheduler::Timer;
use crate::engine::task::Task;
use crate::graph::{AudioBuffer, NodeId, ParamKind};
use crate::io::gesture::Point;
use crate::io::loader::{AssetRequest, LoadedAssets};
use crate::io::view::Snapshot;
use crate::sequencing::seed::{posmod, Bucket};
use crate::synth::{Owned, Synth, SynthCtx, SynthError};

/// Cue points into the recording, in seconds.
pub const TIMES: [f64; 32] = [
    0.23, 1.54, 3.5, 5.45, 6.62, 8.2, 8.8, 9.55, 10.7, 11.6, 11.85, 12.63, 13.2, 14.2, 15.8, 18.7,
    20.2, 21.7, 23.5, 24.25, 28.0, 29.05, 30.0, 32.5, 35.9, 36.4, 37.8, 40.4, 41.75, 43.35, 46.5,
    48.0,
];

pub const GROUP: &str = "concrete";
/// Grid cells per axis when deriving the beat.
pub const QUANTIZE: u32 = 50;
pub const MAX_BEAT: f32 = 31.0;
pub const DELAY_MAX: f64 = 0.5;
pub const DELAY_SPAN: f64 = 0.45;
pub const ROOM_MAX: f32 = 0.95;
pub const DAMPENING_SPAN: f32 = 1500.0;
pub const CUTOFF_MAX: f32 = 20_000.0;
pub const CUTOFF_SPAN: f32 = 19_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub delay: f64,
    pub room: f32,
    pub dampening: f32,
    pub wet: f32,
    pub dry: f32,
    pub cutoff: f32,
}

pub fn params(at: Point) -> Params {
    let wet = (PI * 1.05 * at.y).sin().clamp(0.0, 1.0);
    Params {
        delay: DELAY_MAX - DELAY_SPAN * at.y as f64,
        room: ROOM_MAX * at.y,
        dampening: DAMPENING_SPAN * at.x,
        wet,
        dry: 1.0 - wet,
        cutoff: CUTOFF_MAX - CUTOFF_SPAN * at.x,
    }
}

/// Cue indices for a pointer position. Empty at the origin.
pub fn beat(at: Point) -> Vec<usize> {
    if at.x == 0.0 && at.y == 0.0 {
        return Vec::new();
    }
    let mut rng = Bucket::new(GROUP)
        .axis(at.x, QUANTIZE)
        .axis(at.y, QUANTIZE)
        .rng();
    let len = (MAX_BEAT * at.y).round() as usize + 1;
    (0..len)
        .map(|_| posmod(rng.gen::<i32>() as i64, TIMES.len() as i64) as usize)
        .collect()
}

fn visuals(at: Point, opacity: f32) -> Snapshot {
    Snapshot::Concrete {
        blur: if at.y > 0.75 { 50.0 * (at.y - 0.75) * 4.0 } else { at.x },
        scale: (1.2 * at.y).max(1.0),
        opacity,
    }
}

pub struct Concrete {
    reverb: NodeId,
    filter: NodeId,
    recording: Option<AudioBuffer>,
    params: Params,
    beat: Vec<usize>,
    position: Option<usize>,
    at: Point,
    playing: Option<NodeId>,
    pulse: Task,
    sources: Owned,
}

impl Concrete {
    pub fn new(ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        let audio = &mut *ctx.audio;
        let reverb = audio.reverb();
        let filter = audio.filter(FilterType::LowPass, CUTOFF_MAX, 0.0);
        audio.chain(&[reverb, filter, audio.destination()])?;
        Ok(Self {
            reverb,
            filter,
            recording: None,
            params: params(Point::default()),
            beat: Vec::new(),
            position: None,
            at: Point::default(),
            playing: None,
            pulse: Task::new(0),
            sources: Owned::new(),
        })
    }

    pub fn beat(&self) -> &[usize] {
        &self.beat
    }

    /// Jump to the next cue and wait for the next pulse.
    fn pulse(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        let Some(recording) = self.recording.clone() else {
            return Ok(());
        };
        if !self.beat.is_empty() {
            let next = self.position.map_or(0, |p| (p + 1) % self.beat.len());
            self.position = Some(next);
            let cue = TIMES[self.beat[next]];

            let now = ctx.now();
            self.stop_playing(ctx, now);
            let source = ctx.audio.buffer_source(recording);
            ctx.audio.connect(source, self.reverb)?;
            ctx.audio.set_loop(source, true)?;
            ctx.audio.start_at(source, now, cue)?;
            ctx.audio.free_on_end(&[source], &[])?;
            self.sources.push(source);
            self.playing = Some(source);
        }
        ctx.wake_after(&mut self.pulse, self.params.delay);
        Ok(())
    }

    fn stop_playing(&mut self, ctx: &mut SynthCtx, when: f64) {
        if let Some(source) = self.playing.take() {
            if ctx.audio.contains(source) {
                let _ = ctx.audio.stop(source, when);
            }
        }
    }
}

impl Synth for Concrete {
    fn assets(&self) -> Option<AssetRequest> {
        Some(AssetRequest::new().group(GROUP, ["concrete/concrete.wav"]))
    }

    fn install(&mut self, _ctx: &mut SynthCtx, assets: LoadedAssets) -> Result<(), SynthError> {
        let recording = assets
            .group(GROUP)
            .and_then(|g| g.first())
            .ok_or_else(|| SynthError::MissingAsset(GROUP.to_string()))?;
        self.recording = Some(recording.clone());
        Ok(())
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        if self.recording.is_none() {
            return Ok(());
        }
        self.update(ctx, at)?;
        ctx.publish(visuals(at, 1.0));
        self.pulse(ctx)
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        self.at = at;
        self.params = params(at);
        let p = &self.params;
        let audio = &mut *ctx.audio;
        audio.param(self.reverb, ParamKind::RoomSize)?.set_value(p.room);
        audio.param(self.reverb, ParamKind::Dampening)?.set_value(p.dampening);
        audio.param(self.reverb, ParamKind::Wet)?.set_value(p.wet);
        audio.param(self.reverb, ParamKind::Dry)?.set_value(p.dry);
        audio.param(self.filter, ParamKind::Frequency)?.set_value(p.cutoff);
        self.beat = beat(at);
        if self.pulse.is_armed() {
            ctx.publish(visuals(at, 1.0));
        }
        Ok(())
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        self.pulse.cancel(ctx.timers);
        let now = ctx.now();
        self.stop_playing(ctx, now);
        ctx.publish(visuals(self.at, 0.0));
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        if self.pulse.fired(timer) {
            self.pulse(ctx)?;
        }
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        self.sources.forget(node);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        self.pulse.cancel(ctx.timers);
        self.playing = None;
        self.sources.release(ctx.audio);
        ctx.audio.release(&[self.reverb, self.filter]);
    }
}
