use std::sync::Arc;

/// Decoded mono sample data, shared by every source node that plays it.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: f32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn from_fn(frames: usize, sample_rate: f32, f: impl FnMut(usize) -> f32) -> Self {
        Self::new((0..frames).map(f).collect(), sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Linear interpolation at a fractional frame position. Positions past
    /// either end read as silence.
    #[inline]
    pub fn read(&self, position: f64) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let idx = position as usize;
        let frac = (position - idx as f64) as f32;
        match (self.samples.get(idx), self.samples.get(idx + 1)) {
            (Some(&a), Some(&b)) => a + (b - a) * frac,
            (Some(&a), None) => a * (1.0 - frac),
            _ => 0.0,
        }
    }

    /// Like [`read`](Self::read), but the last frame interpolates towards
    /// the first and positions wrap around the length.
    #[inline]
    pub fn read_looped(&self, position: f64) -> f32 {
        let len = self.samples.len();
        if len == 0 {
            return 0.0;
        }
        let position = position.rem_euclid(len as f64);
        let idx = (position as usize).min(len - 1);
        let frac = (position - idx as f64) as f32;
        let a = self.samples[idx];
        let b = self.samples[(idx + 1) % len];
        a + (b - a) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 24_000], 48_000.0);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_read_interpolates() {
        let buffer = AudioBuffer::new(vec![0.0, 1.0, 0.0], 48_000.0);
        assert_eq!(buffer.read(0.5), 0.5);
        assert_eq!(buffer.read(1.0), 1.0);
        assert_eq!(buffer.read(7.0), 0.0);
        assert_eq!(buffer.read(-1.0), 0.0);
    }

    #[test]
    fn test_read_looped_wraps() {
        let buffer = AudioBuffer::new(vec![0.0, 1.0, 0.5], 48_000.0);
        assert_eq!(buffer.read_looped(2.5), 0.25);
        assert_eq!(buffer.read_looped(4.0), 1.0);
        assert_eq!(buffer.read_looped(-2.0), 1.0);
        assert_eq!(AudioBuffer::new(Vec::new(), 48_000.0).read_looped(1.0), 0.0);
    }
}
