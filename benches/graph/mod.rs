//! Benchmarks for the audio graph on its own.

mod automation;
mod chains;

pub use automation::bench_automation;
pub use chains::bench_chains;
