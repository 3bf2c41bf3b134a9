use crate::graph::buffer::AudioBuffer;
use crate::graph::node::{AudioNode, Block, RenderCtx};

/// Plays an [`AudioBuffer`] from an offset given at start. Resamples by
/// linear interpolation when the buffer and context rates differ. A one-shot
/// source reports itself finished when it runs off the end of the data; a
/// looping one wraps around and plays until it is stopped.
pub struct BufferSourceNode {
    buffer: AudioBuffer,
    position: f64,
    looping: bool,
    finished: bool,
}

impl BufferSourceNode {
    pub fn new(buffer: AudioBuffer) -> Self {
        Self {
            buffer,
            position: 0.0,
            looping: false,
            finished: false,
        }
    }

    /// Seek to `offset` seconds into the buffer. Only meaningful before the
    /// node starts. Looping sources wrap offsets past the end.
    pub fn set_offset(&mut self, offset: f64) {
        self.position = offset.max(0.0) * self.buffer.sample_rate() as f64;
        self.wrap();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.wrap();
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    fn wrap(&mut self) {
        let len = self.buffer.len() as f64;
        if self.looping && len > 0.0 && self.position >= len {
            self.position %= len;
        }
    }
}

impl AudioNode for BufferSourceNode {
    fn process(&mut self, _input: &Block, output: &mut Block, ctx: &RenderCtx) {
        let step = self.buffer.sample_rate() as f64 / ctx.sample_rate as f64;
        let len = self.buffer.len() as f64;
        if self.looping && len > 0.0 {
            for i in ctx.active.clone() {
                output.set_mono(i, self.buffer.read_looped(self.position));
                self.position = (self.position + step) % len;
            }
            return;
        }
        for i in ctx.active.clone() {
            if self.position >= len {
                self.finished = true;
                break;
            }
            output.set_mono(i, self.buffer.read(self.position));
            self.position += step;
        }
        if self.position >= len {
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
