use crate::dsp::filter::{FilterType, SVFilter};
use crate::graph::node::{AudioNode, Block, ParamKind, ParamSet, RenderCtx};
use crate::graph::param::AudioParam;

/*
Filter Node
===========

Wraps one TPT state-variable filter per channel. The toys lean on it in
four shapes:

  lowpass   the minimalism and arpeggiator sweeps, the drone's 200 Hz lid,
            concrete's darkening as x grows
  bandpass  the percolator's drop colour, a narrow ping at Q 5
  notch     the percolator's two output scoops
  highpass  available, unused by the current toys

Cutoff (Hz) is clamped to [10, Nyquist].

Q: Emphasis at the cutoff frequency.
  - Lowpass/highpass: peak height in dB. 0 is flat, 18 is the squelch at
    the top right of the minimalism pad.
  - Bandpass/notch: width, as centre frequency over bandwidth. 5 is a
    narrow ping, 0.1 a broad scoop.

Both cutoff and Q are AudioParams, evaluated per sample.
*/

pub struct FilterNode {
    left: SVFilter,
    right: SVFilter,
    params: ParamSet,
}

impl FilterNode {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, q: f32, sample_rate: f32) -> Self {
        FilterNode {
            left: SVFilter::new(filter_type),
            right: SVFilter::new(filter_type),
            params: ParamSet::new()
                .with(
                    ParamKind::Frequency,
                    AudioParam::new(cutoff_hz, 10.0, sample_rate * 0.5),
                )
                .with(ParamKind::Q, AudioParam::new(q, -770.0, 770.0)),
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.left.filter_type()
    }
}

impl AudioNode for FilterNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        let cutoff = self.params.block(ParamKind::Frequency);
        let q = self.params.block(ParamKind::Q);
        for i in 0..ctx.frames {
            output.left[i] = self.left.process(input.left[i], cutoff[i], q[i], ctx.sample_rate);
            output.right[i] = self
                .right
                .process(input.right[i], cutoff[i], q[i], ctx.sample_rate);
        }
    }

    fn params(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
}
