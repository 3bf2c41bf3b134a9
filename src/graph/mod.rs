//! Schedulable audio graph.
//!
//! An [`AudioContext`] owns every node, the edges between them, and the
//! audio clock. Nodes wrap the low-level DSP primitives in `crate::dsp` and
//! expose [`AudioParam`]s whose automation is resolved per sample, so a toy
//! can schedule a whole note (start, envelope, stop) ahead of time and let
//! the graph play it.

/// Decoded sample data shared between buffer sources.
pub mod buffer;
/// One-shot sample playback.
pub mod buffer_source;
/// Node arena, wiring, source scheduling, and rendering.
pub mod context;
/// State-variable filter node.
pub mod filter;
/// Linear amplitude.
pub mod gain;
/// Core traits shared by all graph nodes.
pub mod node;
/// Audio-band oscillators.
pub mod oscillator;
/// Equal-power stereo placement.
pub mod panner;
/// Automation timelines.
pub mod param;
/// Named per-sample processors (the wave folder).
pub mod processor;
/// Schroeder reverb with wet/dry levels.
pub mod reverb;
/// Transfer-curve distortion.
pub mod shaper;

pub use buffer::AudioBuffer;
pub use context::{AudioContext, GraphError, NodeId, SourceTimes};
pub use node::{AudioNode, Block, ParamKind, RenderCtx};
pub use param::AudioParam;
