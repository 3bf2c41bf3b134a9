use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::graph::node::{AudioNode, Block, ParamKind, ParamSet, RenderCtx};
use crate::graph::param::AudioParam;

/*
Audio Oscillator
================

An oscillator is the fundamental sound source. It generates a repeating
waveform at a specific frequency (pitch), producing the raw audio material
that gets shaped by filters, gains, and effects.

Waveform Types and Their Character:
-----------------------------------

Sine: The purest tone - a single frequency with no harmonics.
  - Sound: Smooth, hollow, flute-like
  - Used by: the drone's body, the percolator's drops, the breathing chords

Sawtooth: The richest waveform - contains all harmonics.
  - Sound: Bright, buzzy, brassy
  - Used by: the minimalism pulse, the modes arpeggio, the drone's overtone

Square: Hollow but powerful - only odd harmonics.
  - Sound: Hollow, woody, clarinet-like
  - Used by: the arpeggiator's detuned stack

Triangle: Mellow and soft - weak odd harmonics.

Lifecycle
---------
An oscillator node is silent until started and is ended for good once its
stop time passes. It is never restarted: every note builds a fresh node.
The frequency is an AudioParam, so a pitch bend can be applied while the
note sounds.
*/

pub struct OscNode {
    osc: Oscillator,
    params: ParamSet,
}

impl OscNode {
    pub fn new(waveform: Waveform, frequency: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        Self {
            osc: Oscillator::new(waveform),
            params: ParamSet::new().with(
                ParamKind::Frequency,
                AudioParam::new(frequency, -nyquist, nyquist),
            ),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }
}

impl AudioNode for OscNode {
    fn process(&mut self, _input: &Block, output: &mut Block, ctx: &RenderCtx) {
        let freq = self.params.block(ParamKind::Frequency);
        for i in ctx.active.clone() {
            output.set_mono(i, self.osc.next_sample(freq[i], ctx.sample_rate));
        }
    }

    fn params(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
}
