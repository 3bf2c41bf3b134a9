//! Benchmarks for parameter automation resolved per sample.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_toys::dsp::oscillator::Waveform;
use saavy_toys::graph::{AudioContext, ParamKind};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_automation(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/automation");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // a gain swelling up and down forever, with the frequency gliding
        let mut ctx = AudioContext::new(SAMPLE_RATE);
        let osc = ctx.oscillator(Waveform::Sine, 440.0);
        let gain = ctx.gain(0.0);
        let dest = ctx.destination();
        ctx.chain(&[osc, gain, dest]).unwrap();
        ctx.start(osc, 0.0).unwrap();

        group.bench_with_input(BenchmarkId::new("ramps", size), &size, |b, _| {
            b.iter(|| {
                let now = ctx.current_time();
                ctx.param(gain, ParamKind::Gain)
                    .unwrap()
                    .linear_ramp_to_value_at_time(0.5, now + 0.001)
                    .exponential_ramp_to_value_at_time(0.01, now + 0.005);
                ctx.param(osc, ParamKind::Frequency)
                    .unwrap()
                    .set_value_at_time(440.0, now)
                    .linear_ramp_to_value_at_time(880.0, now + 0.005);
                ctx.render(black_box(&mut left), black_box(&mut right))
            })
        });
    }

    group.finish();
}
