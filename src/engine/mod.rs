//! The interaction driver.
//!
//! [`Engine`] owns everything a toy runs on: the audio context (created on
//! the first ready interaction and kept for the engine's lifetime), the
//! host-clock timer queue, the random source and the view slot. It turns
//! pointer events into `start`/`update`/`end` calls on the selected synth,
//! fires the synth's timers as the host clock advances, and passes on the
//! end of its sources.
//!
//! The engine never blocks on asset loading: [`Engine::init`] hands back an
//! [`AssetRequest`] and the caller delivers the result later through
//! [`Engine::complete_load`].
//!
//! ```
//! use saavy_toys::{Engine, EngineConfig, Status, SynthKind};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.select(SynthKind::Minimalism);
//! assert!(engine.init().is_none());
//! assert_eq!(engine.status(), Status::Ready);
//!
//! engine.pointer_down(0.5, 0.5);
//! engine.run_for(0.5);
//! engine.pointer_up();
//! engine.run_for(0.5);
//! engine.teardown();
//! assert_eq!(engine.live_nodes(), 0);
//! ```

pub mod scheduler;
pub mod task;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, trace, warn};

use crate::config::EngineConfig;
use crate::graph::AudioContext;
use crate::io::gesture::Point;
use crate::io::loader::{AssetLoader, AssetRequest, LoadError, LoadedAssets};
use crate::io::view::{Snapshot, ViewSlot};
use crate::synth::{AnySynth, Synth, SynthCtx, SynthError, SynthKind};
use crate::RENDER_QUANTUM;

use self::scheduler::{OwnerId, TimerQueue};

/// Timers fired in one tick before the rest are left for the next.
const MAX_DISPATCH: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// No synth constructed yet
    Idle,
    /// Waiting for the assets the synth asked for
    Loading,
    Ready,
    /// The synth hit an error and was torn down
    Halted,
}

pub struct Engine {
    config: EngineConfig,
    audio: Option<AudioContext>,
    timers: TimerQueue,
    rng: StdRng,
    view: ViewSlot,
    kind: SynthKind,
    synth: Option<AnySynth>,
    /// Identity of the current synth instance on the timer queue
    owner: OwnerId,
    next_owner: OwnerId,
    status: Status,
    gesture: Option<Point>,
    host_now: f64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            audio: None,
            timers: TimerQueue::new(),
            view: ViewSlot::new(),
            kind: SynthKind::Minimalism,
            synth: None,
            owner: 0,
            next_owner: 1,
            status: Status::Idle,
            gesture: None,
            host_now: 0.0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kind(&self) -> SynthKind {
        self.kind
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// The shared audio context, once the first ready interaction created it.
    pub fn audio(&self) -> Option<&AudioContext> {
        self.audio.as_ref()
    }

    pub fn current_time(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, AudioContext::current_time)
    }

    pub fn host_now(&self) -> f64 {
        self.host_now
    }

    /// Nodes alive in the graph, not counting the destination.
    pub fn live_nodes(&self) -> usize {
        self.audio.as_ref().map_or(0, AudioContext::live_nodes)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Switch toys. The current one is torn down first, so at most one
    /// synth ever holds nodes.
    pub fn select(&mut self, kind: SynthKind) {
        self.teardown_synth();
        self.kind = kind;
        self.status = Status::Idle;
        self.gesture = None;
        debug!(synth = %kind, "selected");
    }

    /// The ready interaction. Creates the audio context on first use and
    /// constructs the selected synth. Returns the assets the caller must
    /// load and pass to [`Engine::complete_load`], if any.
    pub fn init(&mut self) -> Option<AssetRequest> {
        if matches!(self.status, Status::Loading | Status::Ready) {
            return None;
        }
        let sample_rate = self.config.sample_rate;
        let audio = self.audio.get_or_insert_with(|| {
            debug!(sample_rate, "audio context created");
            AudioContext::new(sample_rate)
        });

        self.owner = self.next_owner;
        self.next_owner += 1;
        let mut ctx = SynthCtx {
            audio,
            timers: &mut self.timers,
            rng: &mut self.rng,
            view: &mut self.view,
            owner: self.owner,
            host_now: self.host_now,
            lead: self.config.schedule_lead,
        };
        let synth = match AnySynth::new(self.kind, &mut ctx) {
            Ok(synth) => synth,
            Err(err) => {
                error!(synth = %self.kind, error = %err, "failed to build synth");
                self.status = Status::Halted;
                return None;
            }
        };

        let request = synth.assets();
        self.synth = Some(synth);
        self.status = if request.is_some() {
            Status::Loading
        } else {
            Status::Ready
        };
        debug!(synth = %self.kind, status = ?self.status, "initialised");
        request
    }

    /// Deliver the loader's answer to an [`Engine::init`] request. A failed
    /// load leaves the synth loading; it never becomes playable.
    pub fn complete_load(&mut self, result: Result<LoadedAssets, LoadError>) {
        if self.status != Status::Loading {
            debug!(status = ?self.status, "load result arrived with nothing waiting");
            return;
        }
        match result {
            Ok(assets) => {
                if self.with_synth(|s, ctx| s.install(ctx, assets)).is_some() {
                    self.status = Status::Ready;
                    debug!(synth = %self.kind, "assets installed");
                }
            }
            Err(err) => warn!(synth = %self.kind, error = %err, "asset load failed"),
        }
    }

    /// [`Engine::init`] followed by a blocking load through `loader`.
    pub fn init_with<L: AssetLoader + ?Sized>(&mut self, loader: &L) -> Status {
        if let Some(request) = self.init() {
            self.complete_load(loader.load(&request));
        }
        self.status
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.status != Status::Ready || self.gesture.is_some() {
            return;
        }
        let at = Point::new(x, y);
        self.gesture = Some(at);
        self.with_synth(|s, ctx| s.start(ctx, at));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if self.gesture.is_none() {
            return;
        }
        let at = Point::new(x, y);
        self.gesture = Some(at);
        self.with_synth(|s, ctx| s.update(ctx, at));
    }

    pub fn pointer_up(&mut self) {
        if self.gesture.take().is_none() {
            return;
        }
        self.with_synth(|s, ctx| s.end(ctx));
    }

    /// Advance the host clock to `host_now` (seconds), fire every timer
    /// that is due and deliver ended sources.
    pub fn tick(&mut self, host_now: f64) {
        self.host_now = self.host_now.max(host_now);

        let mut fired = 0;
        while let Some(timer) = self.timers.pop_due(self.host_now) {
            if timer.owner != self.owner || self.synth.is_none() {
                trace!(owner = timer.owner, "dropped timer of a torn-down synth");
                continue;
            }
            self.with_synth(|s, ctx| s.on_timer(ctx, &timer));
            fired += 1;
            if fired >= MAX_DISPATCH {
                warn!(fired, "timer storm, deferring the rest to the next tick");
                break;
            }
        }

        let ended = match self.audio.as_mut() {
            Some(audio) => audio.take_ended(),
            None => return,
        };
        for node in ended {
            self.with_synth(|s, ctx| s.on_ended(ctx, node));
        }
    }

    /// Render into `left` and `right`, advancing the audio clock. Silence
    /// until the audio context exists.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        match self.audio.as_mut() {
            Some(audio) => audio.render(left, right),
            None => {
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }

    /// Render into the buffers one quantum at a time, with the host clock
    /// following the audio clock. This is how tests, benches and offline
    /// bounces drive the engine.
    pub fn run_into(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let mut offset = 0;
        while offset < frames {
            let end = (offset + RENDER_QUANTUM).min(frames);
            let host_now = self.lock_step_time();
            self.tick(host_now);
            self.render(&mut left[offset..end], &mut right[offset..end]);
            offset = end;
        }
        let host_now = self.lock_step_time();
        self.tick(host_now);
    }

    /// [`Engine::run_into`] for `seconds`, discarding the audio.
    pub fn run_for(&mut self, seconds: f64) {
        let frames = (seconds.max(0.0) * self.config.sample_rate as f64).round() as usize;
        let mut left = vec![0.0; RENDER_QUANTUM];
        let mut right = vec![0.0; RENDER_QUANTUM];
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(RENDER_QUANTUM);
            self.run_into(&mut left[..n], &mut right[..n]);
            done += n;
        }
    }

    /// The newest snapshot, if one was published since the last frame.
    pub fn frame(&mut self) -> Option<Snapshot> {
        self.view.take()
    }

    /// Tear down the synth. The audio context is kept.
    pub fn teardown(&mut self) {
        self.teardown_synth();
        self.gesture = None;
        self.status = Status::Idle;
    }

    fn lock_step_time(&self) -> f64 {
        // before the context exists, hold the host clock where it is
        self.audio
            .as_ref()
            .map_or(self.host_now, |a| self.host_now.max(a.current_time()))
    }

    /// Run `f` against the synth. An error halts and tears down the synth.
    fn with_synth<R>(
        &mut self,
        f: impl FnOnce(&mut AnySynth, &mut SynthCtx) -> Result<R, SynthError>,
    ) -> Option<R> {
        let (Some(synth), Some(audio)) = (self.synth.as_mut(), self.audio.as_mut()) else {
            return None;
        };
        let mut ctx = SynthCtx {
            audio,
            timers: &mut self.timers,
            rng: &mut self.rng,
            view: &mut self.view,
            owner: self.owner,
            host_now: self.host_now,
            lead: self.config.schedule_lead,
        };
        match f(synth, &mut ctx) {
            Ok(value) => Some(value),
            Err(err) => {
                error!(synth = %self.kind, error = %err, "synth halted");
                self.teardown_synth();
                self.gesture = None;
                self.status = Status::Halted;
                None
            }
        }
    }

    fn teardown_synth(&mut self) {
        let Some(mut synth) = self.synth.take() else {
            return;
        };
        if let Some(audio) = self.audio.as_mut() {
            let mut ctx = SynthCtx {
                audio,
                timers: &mut self.timers,
                rng: &mut self.rng,
                view: &mut self.view,
                owner: self.owner,
                host_now: self.host_now,
                lead: self.config.schedule_lead,
            };
            synth.teardown(&mut ctx);
            audio_drain(ctx.audio);
        }
        let dropped = self.timers.cancel_owner(self.owner);
        self.view.publish(Snapshot::Cleared);
        debug!(synth = %synth.kind(), dropped, live = self.live_nodes(), "torn down");
    }
}

/// Forget ended notifications nobody is left to receive.
fn audio_drain(audio: &mut AudioContext) {
    let stale = audio.take_ended().len();
    if stale > 0 {
        trace!(stale, "dropped ended notifications");
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
