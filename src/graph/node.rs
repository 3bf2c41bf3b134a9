use std::ops::Range;

use crate::graph::param::AudioParam;
use crate::RENDER_QUANTUM;

/// Context passed to graph nodes during rendering
///
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - time: Audio-clock time of the first frame in this pass
/// - frames: Frames to render this pass (at most `RENDER_QUANTUM`)
/// - active: Frames during which a source node is playing. Effects ignore it.
pub struct RenderCtx {
    pub sample_rate: f32,
    pub time: f64,
    pub frames: usize,
    pub active: Range<usize>,
}

impl RenderCtx {
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

/// One render quantum of stereo audio.
#[derive(Clone)]
pub struct Block {
    pub left: [f32; RENDER_QUANTUM],
    pub right: [f32; RENDER_QUANTUM],
}

impl Block {
    pub const fn silent() -> Self {
        Self {
            left: [0.0; RENDER_QUANTUM],
            right: [0.0; RENDER_QUANTUM],
        }
    }

    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    pub fn mix_from(&mut self, other: &Block, frames: usize) {
        for i in 0..frames {
            self.left[i] += other.left[i];
            self.right[i] += other.right[i];
        }
    }

    /// Mono sum of the two channels at frame `i`.
    #[inline]
    pub fn mono(&self, i: usize) -> f32 {
        (self.left[i] + self.right[i]) * 0.5
    }

    /// Write the same sample to both channels.
    #[inline]
    pub fn set_mono(&mut self, i: usize, sample: f32) {
        self.left[i] = sample;
        self.right[i] = sample;
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::silent()
    }
}

/// Automatable parameters, named the way the toys address them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Oscillator pitch or filter cutoff (Hz)
    Frequency,
    /// Filter resonance
    Q,
    /// Linear amplitude
    Gain,
    /// Stereo position (-1 left, +1 right)
    Pan,
    /// Reverb comb feedback (0..1)
    RoomSize,
    /// Reverb feedback lowpass cutoff (Hz)
    Dampening,
    /// Reverb wet level
    Wet,
    /// Reverb dry level
    Dry,
}

struct ParamSlot {
    kind: ParamKind,
    param: AudioParam,
    block: [f32; RENDER_QUANTUM],
}

/// The parameters a node exposes, with the per-sample values computed for
/// the current render pass.
#[derive(Default)]
pub struct ParamSet {
    slots: Vec<ParamSlot>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ParamKind, param: AudioParam) -> Self {
        self.slots.push(ParamSlot {
            kind,
            param,
            block: [0.0; RENDER_QUANTUM],
        });
        self
    }

    pub fn get(&self, kind: ParamKind) -> Option<&AudioParam> {
        self.slots.iter().find(|s| s.kind == kind).map(|s| &s.param)
    }

    pub fn get_mut(&mut self, kind: ParamKind) -> Option<&mut AudioParam> {
        self.slots
            .iter_mut()
            .find(|s| s.kind == kind)
            .map(|s| &mut s.param)
    }

    /// Values for the current pass. Unknown kinds read as silence.
    pub fn block(&self, kind: ParamKind) -> &[f32; RENDER_QUANTUM] {
        static EMPTY: [f32; RENDER_QUANTUM] = [0.0; RENDER_QUANTUM];
        self.slots
            .iter()
            .find(|s| s.kind == kind)
            .map_or(&EMPTY, |s| &s.block)
    }

    pub(crate) fn render(&mut self, ctx: &RenderCtx) {
        let dt = ctx.dt();
        for slot in &mut self.slots {
            slot.param.fill(ctx.time, dt, &mut slot.block[..ctx.frames]);
        }
    }

    /// Add an audio-rate input onto a parameter's computed values.
    pub(crate) fn modulate(&mut self, kind: ParamKind, input: &Block, frames: usize) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.kind == kind) {
            let (min, max) = slot.param.range();
            for i in 0..frames {
                slot.block[i] = (slot.block[i] + input.mono(i)).clamp(min, max);
            }
        }
    }

    pub(crate) fn sync_time(&mut self, time: f64) {
        for slot in &mut self.slots {
            slot.param.sync_time(time);
        }
    }
}

/// Core trait for audio graph nodes
///
/// The context sums a node's inputs into `input`, evaluates its parameters,
/// then asks it for one quantum of output.
pub trait AudioNode: Send {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx);

    fn params(&self) -> Option<&ParamSet> {
        None
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        None
    }

    /// Sources that run out of material on their own (a sample reaching its
    /// end) report it here so the context can end them.
    fn is_finished(&self) -> bool {
        false
    }
}
