use std::f32::consts::FRAC_PI_4;

use crate::graph::node::{AudioNode, Block, ParamKind, ParamSet, RenderCtx};
use crate::graph::param::AudioParam;

/*
Stereo Panner
=============

Places a signal between the speakers with an equal-power law, so a sound
keeps the same loudness as it moves:

  angle = (pan + 1) * π/4
  left  = in * cos(angle)
  right = in * sin(angle)

  pan -1.0  hard left
  pan  0.0  centre, both sides at -3 dB
  pan +1.0  hard right

The input is folded to mono first; every source in the toys is mono.
*/

pub struct PannerNode {
    params: ParamSet,
}

impl PannerNode {
    pub fn new(pan: f32) -> Self {
        Self {
            params: ParamSet::new().with(ParamKind::Pan, AudioParam::new(pan, -1.0, 1.0)),
        }
    }
}

impl AudioNode for PannerNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        let pan = self.params.block(ParamKind::Pan);
        for i in 0..ctx.frames {
            let angle = (pan[i] + 1.0) * FRAC_PI_4;
            let mono = input.mono(i);
            output.left[i] = mono * angle.cos();
            output.right[i] = mono * angle.sin();
        }
    }

    fn params(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan_dc(pan: f32) -> (f32, f32) {
        let mut node = PannerNode::new(pan);
        let ctx = RenderCtx {
            sample_rate: 48_000.0,
            time: 0.0,
            frames: 4,
            active: 0..4,
        };
        node.params.render(&ctx);
        let mut input = Block::silent();
        for i in 0..4 {
            input.set_mono(i, 1.0);
        }
        let mut output = Block::silent();
        node.process(&input, &mut output, &ctx);
        (output.left[0], output.right[0])
    }

    #[test]
    fn test_hard_left_and_right() {
        let (l, r) = pan_dc(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = pan_dc(1.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_centre_is_equal_power() {
        let (l, r) = pan_dc(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
    }
}
