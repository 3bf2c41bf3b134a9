use crate::graph::node::{AudioNode, Block, ParamKind, ParamSet, RenderCtx};
use crate::graph::param::AudioParam;

/// Largest magnitude a gain param accepts. Large enough for the wave
/// folder's drive and for audio-rate modulation summed onto it.
const GAIN_LIMIT: f32 = 1.0e4;

/// Multiplies its input by the `Gain` param, sample by sample. Envelopes are
/// automation on that param; signals connected to it modulate it at audio
/// rate (the drum machine's second transport rides on this).
pub struct GainNode {
    params: ParamSet,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            params: ParamSet::new().with(
                ParamKind::Gain,
                AudioParam::new(gain, -GAIN_LIMIT, GAIN_LIMIT),
            ),
        }
    }
}

impl AudioNode for GainNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        let gain = self.params.block(ParamKind::Gain);
        for i in 0..ctx.frames {
            output.left[i] = input.left[i] * gain[i];
            output.right[i] = input.right[i] * gain[i];
        }
    }

    fn params(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
}
