use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type              | constructed by       | passes          | rejects      |
| ----------------- | -------------------- | --------------- | ------------ |
| low-pass          | LPF                  | below cutoff    | above cutoff |
| high-pass         | HPF                  | above cutoff    | below cutoff |
| band-pass         | LPF ∘ HPF (series)   | between cutoffs | outside      |
| notch / band-stop | LPF + HPF (parallel) | outside         | between      |

Q follows biquad conventions so the toys can use the numbers they were tuned
with: for low-pass and high-pass it is the resonant peak in decibels, for
band-pass and notch it is the centre frequency over the bandwidth.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    filter_type: FilterType,

    // Coefficient cache, recomputed only when cutoff or Q move
    last_cutoff: f32,
    last_q: f32,
    g: f32,
    k: f32,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            filter_type,
            last_cutoff: f32::NAN,
            last_q: f32::NAN,
            g: 0.0,
            k: 1.0,
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
        self.last_q = f32::NAN;
    }

    #[inline]
    fn compute_g(cutoff_hz: f32, sample_rate: f32) -> f32 {
        let nyquist = sample_rate * 0.5;
        let cutoff = cutoff_hz.clamp(1.0, nyquist * 0.999);
        (PI * cutoff / sample_rate).tan()
    }

    #[inline]
    fn compute_k(&self, q: f32) -> f32 {
        let k = match self.filter_type {
            FilterType::LowPass | FilterType::HighPass => 1.0 / 10f32.powf(q / 20.0),
            FilterType::BandPass | FilterType::Notch => 1.0 / q.max(1e-4),
        };
        k.clamp(0.01, 20.0)
    }

    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    /// Filter one sample with the given cutoff (Hz) and Q.
    #[inline]
    pub fn process(&mut self, sample: f32, cutoff_hz: f32, q: f32, sample_rate: f32) -> f32 {
        if cutoff_hz != self.last_cutoff {
            self.g = Self::compute_g(cutoff_hz, sample_rate);
            self.last_cutoff = cutoff_hz;
        }
        if q != self.last_q {
            self.k = self.compute_k(q);
            self.last_q = q;
        }

        let outputs = self.next_sample(sample, self.k, self.g);
        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{Oscillator, Waveform};

    const SR: f32 = 48_000.0;

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        let skip = buffer.len().min(256);
        buffer
            .get(skip..)
            .unwrap_or(buffer)
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn filtered_sine(filter: &mut SVFilter, freq: f32, cutoff: f32, q: f32) -> f32 {
        let mut osc = Oscillator::new(Waveform::Sine);
        let buffer: Vec<f32> = (0..2048)
            .map(|_| {
                let s = osc.next_sample(freq, SR);
                filter.process(s, cutoff, q, SR)
            })
            .collect();
        peak_after_transient(&buffer)
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = SVFilter::new(FilterType::LowPass);
        let mut last = 0.0;
        for _ in 0..512 {
            last = filter.process(1.0, 500.0, 0.0, SR);
        }
        assert!(last > 0.99, "got {last}");
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = SVFilter::new(FilterType::HighPass);
        let mut last = 1.0;
        for _ in 0..4096 {
            last = filter.process(1.0, 500.0, 0.0, SR);
        }
        assert!(last.abs() < 0.001, "got {last}");
    }

    #[test]
    fn test_lowpass_filters_high_freq() {
        let mut filter = SVFilter::new(FilterType::LowPass);
        let peak = filtered_sine(&mut filter, 5_000.0, 500.0, 0.0);
        assert!(peak < 0.3, "Expected high freq attenuation, got peak: {peak}");
    }

    #[test]
    fn test_bandpass_emphasizes_cutoff_frequency() {
        let mut filter = SVFilter::new(FilterType::BandPass);
        let pass_peak = filtered_sine(&mut filter, 1_000.0, 1_000.0, 5.0);
        filter.reset();
        let off_peak = filtered_sine(&mut filter, 200.0, 1_000.0, 5.0);
        assert!(
            pass_peak > off_peak * 2.0,
            "pass_peak={pass_peak}, off_peak={off_peak}"
        );
    }

    #[test]
    fn test_notch_rejects_cutoff_frequency() {
        let mut filter = SVFilter::new(FilterType::Notch);
        let center_peak = filtered_sine(&mut filter, 1_000.0, 1_000.0, 0.5);
        filter.reset();
        let off_peak = filtered_sine(&mut filter, 100.0, 1_000.0, 0.5);
        assert!(
            center_peak * 2.0 < off_peak,
            "center_peak={center_peak}, off_peak={off_peak}"
        );
    }

    #[test]
    fn test_resonance_in_decibels_boosts_cutoff() {
        let mut filter = SVFilter::new(FilterType::LowPass);
        let flat = filtered_sine(&mut filter, 1_000.0, 1_000.0, 0.0);
        filter.reset();
        let resonant = filtered_sine(&mut filter, 1_000.0, 1_000.0, 18.0);
        assert!(resonant > flat * 3.0, "flat={flat}, resonant={resonant}");
    }

    #[test]
    fn test_cutoff_above_nyquist_stays_stable() {
        let mut filter = SVFilter::new(FilterType::LowPass);
        for i in 0..4096 {
            let s = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = filter.process(s, 40_000.0, 18.0, SR);
            assert!(out.is_finite());
        }
    }
}
