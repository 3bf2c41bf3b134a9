pub mod config;
pub mod dsp;
pub mod engine; // Interaction driver, host timers, repeating tasks
pub mod graph; // Schedulable audio graph
pub mod io;
pub mod sequencing; // Music theory and seeded sequences
pub mod synth; // The ten toys

pub use config::EngineConfig;
pub use engine::{Engine, Status};
pub use synth::SynthKind;

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Frames rendered per graph pass. Parameter automation and source
/// start/stop times are resolved to the sample inside each quantum.
pub const RENDER_QUANTUM: usize = 128;

/// Shortest ramp the automation timeline will interpolate over.
pub(crate) const MIN_TIME: f64 = 1.0 / 192_000.0;
