//! Reverb - Freeverb-style stereo room
//!
//! Eight lowpass-feedback comb filters in parallel feed four allpass
//! diffusers in series, once per channel. The right channel's delay lines
//! are a few samples longer than the left's, which decorrelates the two
//! tails and gives a mono input a wide image.
//!
//! ```text
//!          ┌─→ [LBCF 1] ─┐
//! input ───┼─→   ...     ┼─→ (+)/8 ─→ [AP 1] → [AP 2] → [AP 3] → [AP 4] ─→ out
//!          └─→ [LBCF 8] ─┘
//! ```
//!
//! ## Lowpass-feedback comb
//!
//! ```text
//! y[n] = x[n - d] + feedback * lp(y[n - d])
//! lp(v)[n] = (1 - damp) * v[n] + damp * lp[n - 1]
//! ```
//!
//! The one-pole lowpass in the loop makes every reflection a little darker
//! than the last, the way soft surfaces absorb high frequencies.
//!
//! ## Allpass diffuser
//!
//! ```text
//! v[n] = x[n] + g * v[n - d]
//! y[n] = v[n - d] - g * v[n]
//! ```
//!
//! Flat magnitude response; smears each echo into a cloud.
//!
//! # Parameters
//!
//! - **Room size** (0-1): comb feedback, i.e. decay time
//! - **Dampening** (Hz): cutoff of the lowpass inside each comb loop

use std::f32::consts::TAU;

/// Comb lengths in samples at 44.1kHz
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
/// Allpass lengths in samples at 44.1kHz
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
/// Extra samples on every right-channel line
const STEREO_SPREAD: usize = 23;
const TUNING_RATE: f32 = 44_100.0;
const ALLPASS_FEEDBACK: f32 = 0.5;
/// Highest comb feedback, keeps a room size of 1.0 from ringing forever
const MAX_FEEDBACK: f32 = 0.98;

fn scaled(samples: usize, sample_rate: f32) -> usize {
    ((samples as f32 * sample_rate / TUNING_RATE) as usize).max(1)
}

/// Lowpass-feedback comb filter. The delay line is allocated once.
pub struct CombFilter {
    line: Vec<f32>,
    pos: usize,
    feedback: f32,
    damp: f32,
    lowpass: f32,
}

impl CombFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            line: vec![0.0; delay_samples.max(1)],
            pos: 0,
            feedback: 0.5,
            damp: 0.5,
            lowpass: 0.0,
        }
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    pub fn set_damp(&mut self, damp: f32) {
        self.damp = damp.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.line[self.pos];
        self.lowpass = out * (1.0 - self.damp) + self.lowpass * self.damp;
        self.line[self.pos] = input + self.lowpass * self.feedback;
        self.pos += 1;
        if self.pos == self.line.len() {
            self.pos = 0;
        }
        out
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.lowpass = 0.0;
        self.pos = 0;
    }
}

/// Schroeder allpass diffuser.
pub struct AllpassFilter {
    line: Vec<f32>,
    pos: usize,
    gain: f32,
}

impl AllpassFilter {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            line: vec![0.0; delay_samples.max(1)],
            pos: 0,
            gain: ALLPASS_FEEDBACK,
        }
    }

    pub fn set_feedback(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 0.9);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line[self.pos];
        let v = input + self.gain * delayed;
        self.line[self.pos] = v;
        self.pos += 1;
        if self.pos == self.line.len() {
            self.pos = 0;
        }
        delayed - self.gain * v
    }

    pub fn reset(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
    }
}

/// One channel's comb bank and diffusers.
struct Tank {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        Self {
            combs: COMB_TUNING.map(|n| CombFilter::new(scaled(n + spread, sample_rate))),
            allpasses: ALLPASS_TUNING.map(|n| AllpassFilter::new(scaled(n + spread, sample_rate))),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut out = self.combs.iter_mut().map(|c| c.process(input)).sum::<f32>() / 8.0;
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }
}

/// Stereo reverb. Mono in, decorrelated stereo tail out.
pub struct Freeverb {
    left: Tank,
    right: Tank,
    sample_rate: f32,
}

impl Freeverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: Tank::new(sample_rate, 0),
            right: Tank::new(sample_rate, STEREO_SPREAD),
            sample_rate,
        }
    }

    /// 0.0 leaves a single faint echo; values near 1.0 ring for many
    /// seconds.
    pub fn set_room_size(&mut self, size: f32) {
        let feedback = size.clamp(0.0, 1.0) * MAX_FEEDBACK;
        for comb in self.combs_mut() {
            comb.set_feedback(feedback);
        }
    }

    /// Cutoff of the lowpass in every comb loop, in Hz.
    pub fn set_dampening(&mut self, cutoff_hz: f32) {
        let cutoff = cutoff_hz.clamp(0.0, self.sample_rate * 0.5);
        let damp = (-TAU * cutoff / self.sample_rate).exp();
        for comb in self.combs_mut() {
            comb.set_damp(damp);
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> (f32, f32) {
        (self.left.process(input), self.right.process(input))
    }

    pub fn reset(&mut self) {
        for comb in self.combs_mut() {
            comb.reset();
        }
        for allpass in self.left.allpasses.iter_mut().chain(&mut self.right.allpasses) {
            allpass.reset();
        }
    }

    fn combs_mut(&mut self) -> impl Iterator<Item = &mut CombFilter> {
        self.left.combs.iter_mut().chain(self.right.combs.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comb_echoes_after_its_delay() {
        let mut comb = CombFilter::new(10);
        comb.set_feedback(0.5);
        comb.set_damp(0.0);

        assert_eq!(comb.process(1.0), 0.0);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert_eq!(comb.process(0.0), 1.0);
        for _ in 0..9 {
            comb.process(0.0);
        }
        assert!((comb.process(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_allpass_keeps_energy() {
        let mut allpass = AllpassFilter::new(5);
        let mut energy_in = 0.0;
        let mut energy_out = 0.0;
        for i in 0..400 {
            let input = if i < 10 { 1.0 } else { 0.0 };
            let output = allpass.process(input);
            energy_in += input * input;
            energy_out += output * output;
        }
        assert!((energy_out - energy_in).abs() < 0.05 * energy_in);
    }

    #[test]
    fn test_tail_is_stereo() {
        let mut reverb = Freeverb::new(48_000.0);
        reverb.set_room_size(0.8);
        reverb.set_dampening(3000.0);

        let _ = reverb.process(1.0);
        let mut differs = false;
        let mut peak = 0.0f32;
        for _ in 0..6000 {
            let (l, r) = reverb.process(0.0);
            peak = peak.max(l.abs());
            differs |= (l - r).abs() > 1e-4;
        }
        assert!(peak > 0.001, "no tail after an impulse");
        assert!(differs, "channels should decorrelate");
    }

    #[test]
    fn test_full_room_stays_bounded() {
        let mut reverb = Freeverb::new(48_000.0);
        reverb.set_room_size(1.0);
        reverb.set_dampening(20_000.0);
        for _ in 0..10_000 {
            let (l, r) = reverb.process(0.1);
            assert!(l.is_finite() && r.is_finite());
            assert!(l.abs() < 10.0 && r.abs() < 10.0, "unstable: {l} {r}");
        }
    }

    #[test]
    fn test_dampening_darkens_tail() {
        // alternating impulses are all high-frequency energy
        let tail_energy = |cutoff: f32| {
            let mut reverb = Freeverb::new(48_000.0);
            reverb.set_room_size(0.9);
            reverb.set_dampening(cutoff);
            let mut energy = 0.0;
            for i in 0..20_000 {
                let input = match i {
                    0..=63 if i % 2 == 0 => 1.0,
                    0..=63 => -1.0,
                    _ => 0.0,
                };
                let (out, _) = reverb.process(input);
                if i > 4_000 {
                    energy += out * out;
                }
            }
            energy
        };
        assert!(tail_energy(500.0) < tail_energy(20_000.0));
    }

    #[test]
    fn test_reset_silences() {
        let mut reverb = Freeverb::new(44_100.0);
        for _ in 0..100 {
            reverb.process(1.0);
        }
        reverb.reset();
        assert_eq!(reverb.process(0.0), (0.0, 0.0));
    }
}
