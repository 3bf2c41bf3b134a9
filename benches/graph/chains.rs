//! Benchmarks for persistent node chains like the ones the toys build.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_toys::dsp::filter::FilterType;
use saavy_toys::dsp::oscillator::Waveform;
use saavy_toys::dsp::shaper::Curve;
use saavy_toys::graph::{AudioContext, ParamKind};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/chains");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // saw → lowpass → panner, the shape of a single pulse note
        let mut ctx = AudioContext::new(SAMPLE_RATE);
        let osc = ctx.oscillator(Waveform::Saw, 110.0);
        let filter = ctx.filter(FilterType::LowPass, 800.0, 4.0);
        let panner = ctx.panner(0.3);
        let dest = ctx.destination();
        ctx.chain(&[osc, filter, panner, dest]).unwrap();
        ctx.start(osc, 0.0).unwrap();
        group.bench_with_input(BenchmarkId::new("voice", size), &size, |b, _| {
            b.iter(|| ctx.render(black_box(&mut left), black_box(&mut right)))
        });

        // sine → shaper → reverb, the drone and percolator tail
        let mut ctx = AudioContext::new(SAMPLE_RATE);
        let osc = ctx.oscillator(Waveform::Sine, 220.0);
        let shaper = ctx.shaper(Curve::from_fn(256, |x| (3.0 * x).tanh()));
        let reverb = ctx.reverb();
        ctx.param(reverb, ParamKind::RoomSize).unwrap().set_value(0.95);
        let dest = ctx.destination();
        ctx.chain(&[osc, shaper, reverb, dest]).unwrap();
        ctx.start(osc, 0.0).unwrap();
        group.bench_with_input(BenchmarkId::new("shaped_reverb", size), &size, |b, _| {
            b.iter(|| ctx.render(black_box(&mut left), black_box(&mut right)))
        });

        // sixteen voices summed into one filter
        let mut ctx = AudioContext::new(SAMPLE_RATE);
        let filter = ctx.filter(FilterType::LowPass, 2000.0, 1.0);
        let dest = ctx.destination();
        ctx.connect(filter, dest).unwrap();
        for i in 0..16 {
            let osc = ctx.oscillator(Waveform::Triangle, 110.0 * (1.0 + i as f32 * 0.25));
            let gain = ctx.gain(0.05);
            ctx.chain(&[osc, gain, filter]).unwrap();
            ctx.start(osc, 0.0).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("sixteen_voices", size), &size, |b, _| {
            b.iter(|| ctx.render(black_box(&mut left), black_box(&mut right)))
        });
    }

    group.finish();
}
