//! Phase-accumulator oscillator.
//!
//! Frequency is passed per sample so the graph can feed it straight from an
//! automated parameter. Saw and square use a polyBLEP correction at the
//! discontinuities, which keeps aliasing tolerable for the low drones and
//! buzzes the toys play without needing oversampling.

use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

pub struct Oscillator {
    waveform: Waveform,
    phase: f64, // [0, 1)
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Produce one sample and advance the phase.
    ///
    /// Negative frequencies run the phase backwards, as a Web Audio style
    /// oscillator does.
    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let dt = frequency as f64 / sample_rate as f64;
        let t = self.phase;

        let out = match self.waveform {
            Waveform::Sine => (TAU * t).sin(),
            Waveform::Saw => 2.0 * t - 1.0 - poly_blep(t, dt.abs()),
            Waveform::Square => {
                let naive = if t < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(t, dt.abs()) - poly_blep((t + 0.5).fract(), dt.abs())
            }
            Waveform::Triangle => 1.0 - 4.0 * (t - 0.5).abs(),
        };

        self.phase = (self.phase + dt).rem_euclid(1.0);
        out as f32
    }
}

/// Polynomial band-limited step, subtracted around each wrap of the phase.
#[inline]
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(waveform: Waveform, freq: f32, n: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(waveform);
        (0..n).map(|_| osc.next_sample(freq, 48_000.0)).collect()
    }

    #[test]
    fn test_sine_starts_at_zero_and_peaks_at_quarter_period() {
        // 480 Hz at 48k = 100 samples per period
        let out = render(Waveform::Sine, 480.0, 100);
        assert!(out[0].abs() < 1e-6);
        assert!((out[25] - 1.0).abs() < 1e-3);
        assert!((out[75] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_waveforms_stay_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            for sample in render(waveform, 1234.5, 4800) {
                assert!(sample.is_finite());
                assert!(sample.abs() <= 1.1, "{waveform:?} out of range: {sample}");
            }
        }
    }

    #[test]
    fn test_square_has_no_dc_offset() {
        let out = render(Waveform::Square, 100.0, 48_000);
        let mean: f32 = out.iter().sum::<f32>() / out.len() as f32;
        assert!(mean.abs() < 0.01, "DC offset {mean}");
    }

    #[test]
    fn test_zero_frequency_holds_phase() {
        let out = render(Waveform::Saw, 0.0, 16);
        assert!(out.windows(2).all(|w| w[0] == w[1]));
    }
}
