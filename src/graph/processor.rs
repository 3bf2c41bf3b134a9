//! Custom processors: per-sample code installed by name at load time and
//! hosted in the graph like any other node.

use crate::dsp::shaper::fold;
use crate::graph::node::{AudioNode, Block, RenderCtx};

/// User-supplied sample processing hosted by a [`ProcessorNode`].
pub trait Processor: Send {
    fn process(&mut self, input: &Block, output: &mut Block, frames: usize);
}

/// Builds a fresh processor instance for each node that hosts one.
pub type ProcessorFactory = fn() -> Box<dyn Processor>;

/// Name of the wave folder in the processor registry.
pub const WAVE_FOLDER: &str = "wave-folder";

/// Processors this crate can install, by registry name.
pub fn lookup(name: &str) -> Option<ProcessorFactory> {
    match name {
        WAVE_FOLDER => Some(wave_folder as ProcessorFactory),
        _ => None,
    }
}

fn wave_folder() -> Box<dyn Processor> {
    Box::new(WaveFolder)
}

/// Reflects anything beyond ±1 back into range, sample by sample.
pub struct WaveFolder;

impl Processor for WaveFolder {
    fn process(&mut self, input: &Block, output: &mut Block, frames: usize) {
        for i in 0..frames {
            output.left[i] = fold(input.left[i]);
            output.right[i] = fold(input.right[i]);
        }
    }
}

pub struct ProcessorNode {
    processor: Box<dyn Processor>,
}

impl ProcessorNode {
    pub fn new(processor: Box<dyn Processor>) -> Self {
        Self { processor }
    }
}

impl AudioNode for ProcessorNode {
    fn process(&mut self, input: &Block, output: &mut Block, ctx: &RenderCtx) {
        self.processor.process(input, output, ctx.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_knows_the_wave_folder() {
        assert!(lookup(WAVE_FOLDER).is_some());
        assert!(lookup("bit-crusher").is_none());
    }

    #[test]
    fn test_wave_folder_keeps_driven_sine_in_range() {
        let Some(factory) = lookup(WAVE_FOLDER) else {
            panic!("wave folder missing");
        };
        let mut folder = factory();
        let mut input = Block::silent();
        for i in 0..64 {
            input.set_mono(i, 12.0 * (i as f32 * 0.1).sin());
        }
        let mut output = Block::silent();
        folder.process(&input, &mut output, 64);
        assert!(output.left[..64].iter().all(|s| s.abs() <= 1.0 + 1e-5));
        assert!(output.left[..64].iter().any(|s| s.abs() > 0.5));
    }
}
