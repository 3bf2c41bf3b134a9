//! Render cost of the audio graph and of the toys.
//!
//! Run with: cargo bench
//!
//! Every toy renders through one `AudioContext`, so the figure that matters
//! is the time to render a block against its real-time deadline:
//!   - 128 samples = 2.67ms at 48kHz
//!   - 512 samples = 10.67ms at 48kHz
//!
//! Benchmark groups:
//!   - graph/*  Node chains and automation on a bare context
//!   - toys/*   A held gesture on each toy, driven through the engine

use criterion::{criterion_group, criterion_main};

mod graph;
mod toys;

/// Block sizes an output device typically asks for.
pub const BLOCK_SIZES: &[usize] = &[128, 512];

pub const SAMPLE_RATE: f32 = 48_000.0;

criterion_group!(
    benches,
    graph::bench_chains,
    graph::bench_automation,
    toys::bench_held,
    toys::bench_churn,
);
criterion_main!(benches);
