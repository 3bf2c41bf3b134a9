//! A pointer held on each toy, rendered block by block.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_toys::io::SynthesizedLoader;
use saavy_toys::{Engine, EngineConfig, SynthKind};

use crate::SAMPLE_RATE;

const BLOCK: usize = 512;

fn held(kind: SynthKind) -> Engine {
    let mut engine = Engine::new(EngineConfig::default().sample_rate(SAMPLE_RATE));
    engine.select(kind);
    engine.init_with(&SynthesizedLoader::new(SAMPLE_RATE, 1));
    engine.pointer_down(0.6, 0.4);
    // let the rhythmic toys fill up
    engine.run_for(1.0);
    engine
}

pub fn bench_held(c: &mut Criterion) {
    let mut group = c.benchmark_group("toys/held");
    let mut left = vec![0.0f32; BLOCK];
    let mut right = vec![0.0f32; BLOCK];

    for kind in SynthKind::ALL {
        let mut engine = held(kind);
        group.bench_with_input(BenchmarkId::new(kind.name(), BLOCK), &kind, |b, _| {
            b.iter(|| engine.run_into(black_box(&mut left), black_box(&mut right)))
        });
    }

    group.finish();
}

/// A pointer sweeping the pad while it renders, so every block carries
/// updates and, for the sample toys, fresh sources.
pub fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("toys/churn");
    let mut left = vec![0.0f32; BLOCK];
    let mut right = vec![0.0f32; BLOCK];

    for kind in [SynthKind::Concrete, SynthKind::Drums, SynthKind::Dna] {
        let mut engine = held(kind);
        let mut step = 0u32;
        group.bench_with_input(BenchmarkId::new(kind.name(), BLOCK), &kind, |b, _| {
            b.iter(|| {
                step = step.wrapping_add(1);
                let x = (step % 97) as f32 / 96.0;
                engine.pointer_move(x, 1.0 - x);
                engine.run_into(black_box(&mut left), black_box(&mut right))
            })
        });
    }

    group.finish();
}
