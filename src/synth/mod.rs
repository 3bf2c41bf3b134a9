// Purpose: the ten toys, and the contract the engine drives them through.
// Each toy owns a small corner of the audio graph and schedules its own
// notes on the audio clock, waking up through host timers.

pub mod arpeggiator;
pub mod breath;
pub mod concrete;
pub mod dna;
pub mod drone;
pub mod drums;
pub mod minimalism;
pub mod modes;
pub mod percolator;
pub mod wavefolder;

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use thiserror::Error;

use crate::engine::scheduler::{OwnerId, Timer, TimerQueue};
use crate::engine::task::Task;
use crate::graph::{AudioContext, GraphError, NodeId};
use crate::io::gesture::Point;
use crate::io::loader::{AssetRequest, LoadError, LoadedAssets};
use crate::io::view::{Snapshot, ViewSlot};
use crate::sequencing::TheoryError;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Theory(#[from] TheoryError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("unknown base '{0}' in the sequence")]
    UnknownLetter(char),
    #[error("no '{0}' samples were loaded")]
    MissingAsset(String),
}

/// Everything a synth may touch while handling one call.
pub struct SynthCtx<'a> {
    pub audio: &'a mut AudioContext,
    pub timers: &'a mut TimerQueue,
    pub rng: &'a mut StdRng,
    pub view: &'a mut ViewSlot,
    pub owner: OwnerId,
    /// Host clock, seconds
    pub host_now: f64,
    /// How far ahead of an audio event its wake-up fires
    pub lead: f64,
}

impl SynthCtx<'_> {
    /// Audio clock, seconds.
    pub fn now(&self) -> f64 {
        self.audio.current_time()
    }

    /// Host time at which the audio clock will read `audio_time`.
    pub fn host_time_for(&self, audio_time: f64) -> f64 {
        self.host_now + (audio_time - self.now())
    }

    /// Arm `task` to wake one lead before `audio_time` (or right away if
    /// that is already past).
    pub fn wake_before(&mut self, task: &mut Task, audio_time: f64) {
        let due = (self.host_time_for(audio_time) - self.lead).max(self.host_now);
        task.arm(self.timers, self.owner, due);
    }

    /// Arm `task` to wake `delay` seconds from now on the host clock.
    pub fn wake_after(&mut self, task: &mut Task, delay: f64) {
        task.arm(self.timers, self.owner, self.host_now + delay.max(0.0));
    }

    pub fn publish(&mut self, snapshot: Snapshot) {
        self.view.publish(snapshot);
    }
}

/// Contract between the engine and a toy.
///
/// `start`, `update` and `end` follow the pointer. `on_timer` and
/// `on_ended` deliver the synth's own wake-ups and the end of its sources.
/// `teardown` must leave nothing behind (no nodes, no timers) from any state
/// and may be called more than once.
pub trait Synth {
    /// Samples and processors to fetch before the synth is playable.
    fn assets(&self) -> Option<AssetRequest> {
        None
    }

    fn install(&mut self, _ctx: &mut SynthCtx, _assets: LoadedAssets) -> Result<(), SynthError> {
        Ok(())
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError>;

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError>;

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError>;

    fn on_timer(&mut self, _ctx: &mut SynthCtx, _timer: &Timer) -> Result<(), SynthError> {
        Ok(())
    }

    fn on_ended(&mut self, _ctx: &mut SynthCtx, _node: NodeId) -> Result<(), SynthError> {
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut SynthCtx);
}

/// Node ids a synth is responsible for freeing.
#[derive(Debug, Default, Clone)]
pub struct Owned {
    nodes: Vec<NodeId>,
}

impl Owned {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: NodeId) {
        self.nodes.push(id);
    }

    pub fn forget(&mut self, id: NodeId) {
        self.nodes.retain(|&n| n != id);
    }

    /// Drop ids the graph has already freed.
    pub fn prune(&mut self, audio: &AudioContext) {
        self.nodes.retain(|&n| audio.contains(n));
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stop every started source at `when`. Ids that are gone or never
    /// started are skipped.
    pub fn stop_all(&self, audio: &mut AudioContext, when: f64) {
        for &id in &self.nodes {
            if audio.source_times(id).is_ok_and(|t| t.start.is_some() && !t.ended) {
                let _ = audio.stop(id, when);
            }
        }
    }

    /// Free everything still alive and forget it all.
    pub fn release(&mut self, audio: &mut AudioContext) -> usize {
        let freed = audio.release(&self.nodes);
        self.nodes.clear();
        freed
    }
}

/// The toys, in the order they are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SynthKind {
    Minimalism,
    Arpeggiator,
    Concrete,
    Modes,
    Dna,
    Drone,
    Percolator,
    WaveFolder,
    Drums,
    Breath,
}

impl SynthKind {
    pub const ALL: [SynthKind; 10] = [
        SynthKind::Minimalism,
        SynthKind::Arpeggiator,
        SynthKind::Concrete,
        SynthKind::Modes,
        SynthKind::Dna,
        SynthKind::Drone,
        SynthKind::Percolator,
        SynthKind::WaveFolder,
        SynthKind::Drums,
        SynthKind::Breath,
    ];

    /// Position in the sequence, starting at 1.
    pub fn id(self) -> u8 {
        Self::ALL.iter().position(|&k| k == self).map_or(0, |i| i as u8 + 1)
    }

    pub fn from_id(id: u8) -> Option<SynthKind> {
        Self::ALL.get((id as usize).checked_sub(1)?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            SynthKind::Minimalism => "minimalism",
            SynthKind::Arpeggiator => "arpeggiator",
            SynthKind::Concrete => "concrete",
            SynthKind::Modes => "modes",
            SynthKind::Dna => "dna",
            SynthKind::Drone => "drone",
            SynthKind::Percolator => "percolator",
            SynthKind::WaveFolder => "wavefolder",
            SynthKind::Drums => "drums",
            SynthKind::Breath => "breath",
        }
    }
}

impl fmt::Display for SynthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no synth called '{0}'")]
pub struct UnknownSynth(pub String);

impl FromStr for SynthKind {
    type Err = UnknownSynth;

    /// Accepts a name (`drone`) or a position (`6`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u8>() {
            return SynthKind::from_id(id).ok_or_else(|| UnknownSynth(s.to_string()));
        }
        SynthKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSynth(s.to_string()))
    }
}

/// A constructed toy of any kind.
pub enum AnySynth {
    Minimalism(minimalism::Minimalism),
    Arpeggiator(arpeggiator::Arpeggiator),
    Concrete(concrete::Concrete),
    Modes(modes::Modes),
    Dna(dna::Dna),
    Drone(drone::Drone),
    Percolator(percolator::Percolator),
    WaveFolder(wavefolder::WaveFolder),
    Drums(drums::Drums),
    Breath(breath::Breath),
}

macro_rules! forward {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AnySynth::Minimalism($s) => $body,
            AnySynth::Arpeggiator($s) => $body,
            AnySynth::Concrete($s) => $body,
            AnySynth::Modes($s) => $body,
            AnySynth::Dna($s) => $body,
            AnySynth::Drone($s) => $body,
            AnySynth::Percolator($s) => $body,
            AnySynth::WaveFolder($s) => $body,
            AnySynth::Drums($s) => $body,
            AnySynth::Breath($s) => $body,
        }
    };
}

impl AnySynth {
    /// Build a synth and its persistent nodes.
    pub fn new(kind: SynthKind, ctx: &mut SynthCtx) -> Result<Self, SynthError> {
        Ok(match kind {
            SynthKind::Minimalism => AnySynth::Minimalism(minimalism::Minimalism::new(ctx)?),
            SynthKind::Arpeggiator => AnySynth::Arpeggiator(arpeggiator::Arpeggiator::new(ctx)?),
            SynthKind::Concrete => AnySynth::Concrete(concrete::Concrete::new(ctx)?),
            SynthKind::Modes => AnySynth::Modes(modes::Modes::new(ctx)?),
            SynthKind::Dna => AnySynth::Dna(dna::Dna::new(ctx)?),
            SynthKind::Drone => AnySynth::Drone(drone::Drone::new(ctx)?),
            SynthKind::Percolator => AnySynth::Percolator(percolator::Percolator::new(ctx)?),
            SynthKind::WaveFolder => AnySynth::WaveFolder(wavefolder::WaveFolder::new(ctx)?),
            SynthKind::Drums => AnySynth::Drums(drums::Drums::new(ctx)?),
            SynthKind::Breath => AnySynth::Breath(breath::Breath::new(ctx)?),
        })
    }

    pub fn kind(&self) -> SynthKind {
        match self {
            AnySynth::Minimalism(_) => SynthKind::Minimalism,
            AnySynth::Arpeggiator(_) => SynthKind::Arpeggiator,
            AnySynth::Concrete(_) => SynthKind::Concrete,
            AnySynth::Modes(_) => SynthKind::Modes,
            AnySynth::Dna(_) => SynthKind::Dna,
            AnySynth::Drone(_) => SynthKind::Drone,
            AnySynth::Percolator(_) => SynthKind::Percolator,
            AnySynth::WaveFolder(_) => SynthKind::WaveFolder,
            AnySynth::Drums(_) => SynthKind::Drums,
            AnySynth::Breath(_) => SynthKind::Breath,
        }
    }
}

impl Synth for AnySynth {
    fn assets(&self) -> Option<AssetRequest> {
        forward!(self, s => s.assets())
    }

    fn install(&mut self, ctx: &mut SynthCtx, assets: LoadedAssets) -> Result<(), SynthError> {
        forward!(self, s => s.install(ctx, assets))
    }

    fn start(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        forward!(self, s => s.start(ctx, at))
    }

    fn update(&mut self, ctx: &mut SynthCtx, at: Point) -> Result<(), SynthError> {
        forward!(self, s => s.update(ctx, at))
    }

    fn end(&mut self, ctx: &mut SynthCtx) -> Result<(), SynthError> {
        forward!(self, s => s.end(ctx))
    }

    fn on_timer(&mut self, ctx: &mut SynthCtx, timer: &Timer) -> Result<(), SynthError> {
        forward!(self, s => s.on_timer(ctx, timer))
    }

    fn on_ended(&mut self, ctx: &mut SynthCtx, node: NodeId) -> Result<(), SynthError> {
        forward!(self, s => s.on_ended(ctx, node))
    }

    fn teardown(&mut self, ctx: &mut SynthCtx) {
        forward!(self, s => s.teardown(ctx))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A bare harness for driving one synth without the engine.

    use rand::SeedableRng;

    use super::*;

    pub const SR: f32 = 48_000.0;

    /// An 11x11 grid over the pad, plus positions off its edges.
    pub fn pad() -> impl Iterator<Item = Point> {
        let grid = (0..=10).flat_map(|i| (0..=10).map(move |j| (i as f32 / 10.0, j as f32 / 10.0)));
        grid.chain([(-1.0, 2.0), (1.5, -0.5), (f32::NAN, 0.5)])
            .map(|(x, y)| Point::new(x, y))
    }

    pub struct Rig {
        pub audio: AudioContext,
        pub timers: TimerQueue,
        pub rng: StdRng,
        pub view: ViewSlot,
        pub host_now: f64,
    }

    impl Rig {
        pub fn new() -> Self {
            Self {
                audio: AudioContext::new(SR),
                timers: TimerQueue::new(),
                rng: StdRng::seed_from_u64(11),
                view: ViewSlot::new(),
                host_now: 0.0,
            }
        }

        pub fn ctx(&mut self) -> SynthCtx<'_> {
            SynthCtx {
                audio: &mut self.audio,
                timers: &mut self.timers,
                rng: &mut self.rng,
                view: &mut self.view,
                owner: 1,
                host_now: self.host_now,
                lead: 0.1,
            }
        }

        /// Render and fire timers in lock-step for `seconds`.
        pub fn run<S: Synth>(&mut self, synth: &mut S, seconds: f64) {
            let quantum = crate::RENDER_QUANTUM;
            let steps = (seconds * SR as f64 / quantum as f64).ceil() as usize;
            let mut left = vec![0.0; quantum];
            let mut right = vec![0.0; quantum];
            for _ in 0..steps {
                while let Some(timer) = self.timers.pop_due(self.host_now) {
                    synth.on_timer(&mut self.ctx(), &timer).unwrap();
                }
                self.audio.render(&mut left, &mut right);
                self.host_now = self.audio.current_time();
                for node in self.audio.take_ended() {
                    synth.on_ended(&mut self.ctx(), node).unwrap();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_parse_by_name_and_position() {
        assert_eq!("drone".parse(), Ok(SynthKind::Drone));
        assert_eq!("WaveFolder".parse(), Ok(SynthKind::WaveFolder));
        assert_eq!("10".parse(), Ok(SynthKind::Breath));
        assert_eq!(SynthKind::Dna.id(), 5);
        assert!("0".parse::<SynthKind>().is_err());
        assert!("theremin".parse::<SynthKind>().is_err());
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in SynthKind::ALL {
            assert_eq!(SynthKind::from_id(kind.id()), Some(kind));
        }
    }
}
