use crate::dsp::reverb::Freeverb;
use crate::graph::node::{AudioNode, Block, ParamKind, ParamSet, RenderCtx};
use crate::graph::param::AudioParam;

/*
Reverb Node
===========

Simulates the reflections of a physical space around a dry signal.

  in ──┬─────────────────────────── × dry ──┐
       └── mono → [freeverb] ─ L/R × wet ──┴──→ out

Parameters
----------

RoomSize (0.0 - 1.0):
  Comb feedback. 0.95 is a cathedral, 0.98 the breathing toy's endless wash.

Dampening (Hz):
  Cutoff of the lowpass in each comb's feedback loop. 20000 keeps the
  percolator's tail glassy, 5000 rounds the DNA samples off.

Wet / Dry (linear gain):
  Evaluated per sample. RoomSize and Dampening are read once per render
  pass, which is plenty for pointer-rate changes.

Defaults: room 0.8, dampening 3000 Hz, wet 1, dry 1.
*/

pub struct ReverbNode {
    reverb: Box<Freeverb>,
    params: ParamSet,
    room_size: f32,
    dampening: f32,
}

impl ReverbNode {
    pub fn new(sample_rate: f32) -> Self {
        let room_size = 0.8;
        let dampening = 3000.0;
        let mut reverb = Box::new(Freeverb::new(sample_rate));
        reverb.set_room_size(room_size);
        reverb.set_dampening(dampening);

        Self {
            reverb,
            params: ParamSet::new()
                .with(ParamKind::RoomSize, AudioParam::new(room_size, 0.0, 1.0))
                .with(
                    ParamKind::Dampening,
                    AudioParam::new(dampening, 0.0, sample_rate * 0.5),
                )
                .with(ParamKind::Wet, AudioParam::new(1.0, 0.0, 1.0))
                .with(ParamKind::Dry, AudioParam::new(1.0, 0.0, 1.0)),
            room_size,
            dampening,
        }
    }
}

impl AudioNode for ReverbNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        if ctx.frames == 0 {
            return;
        }

        let room_size = self.params.block(ParamKind::RoomSize)[0];
        if room_size != self.room_size {
            self.room_size = room_size;
            self.reverb.set_room_size(room_size);
        }
        let dampening = self.params.block(ParamKind::Dampening)[0];
        if dampening != self.dampening {
            self.dampening = dampening;
            self.reverb.set_dampening(dampening);
        }

        let wet = self.params.block(ParamKind::Wet);
        let dry = self.params.block(ParamKind::Dry);
        for i in 0..ctx.frames {
            let (l, r) = self.reverb.process(input.mono(i));
            output.left[i] = input.left[i] * dry[i] + l * wet[i];
            output.right[i] = input.right[i] * dry[i] + r * wet[i];
        }
    }

    fn params(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
}
