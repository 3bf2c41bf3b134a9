//! Low-level DSP primitives used by the graph nodes.
//!
//! These components are allocation-free once constructed, so the audio
//! callback can run them without touching the allocator. They stay focused on
//! the signal-processing math; scheduling and parameter automation belong to
//! the graph layer.

/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Band-limited oscillator waveforms.
pub mod oscillator;
/// Schroeder reverb built from comb and allpass delay lines.
pub mod reverb;
/// Curve waveshaping and wave folding.
pub mod shaper;
