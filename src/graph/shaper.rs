use crate::dsp::shaper::Curve;
use crate::graph::node::{AudioNode, Block, RenderCtx};

/// Runs its input through a transfer curve. The curve can be swapped while
/// the node plays; the drone recomputes its curve ten times a second.
pub struct ShaperNode {
    curve: Curve,
}

impl ShaperNode {
    pub fn new(curve: Curve) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn set_curve(&mut self, curve: Curve) {
        self.curve = curve;
    }
}

impl AudioNode for ShaperNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        for i in 0..ctx.frames {
            output.left[i] = self.curve.apply(input.left[i]);
            output.right[i] = self.curve.apply(input.right[i]);
        }
    }
}
