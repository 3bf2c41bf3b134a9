//! Waveshaping
//!
//! A waveshaper applies a transfer function to each sample:
//!   output = f(input)
//!
//! Two flavours live here:
//!
//! Curve lookup:
//!   f is a table of N points spread evenly over [-1, 1], read with linear
//!   interpolation. Inputs outside [-1, 1] hold the end values. An empty
//!   table passes the signal through untouched.
//!
//! Wave folding:
//!   Whenever the signal crosses ±1 it is reflected back into range, so a
//!   sine pushed with a gain of 12 folds over itself six times per half
//!   cycle. The harmonics climb smoothly with the drive instead of turning
//!   into the buzz of a clipper.
//!
//! ```text
//!   in:   0.5   1.5   2.5   3.5
//!   out:  0.5   0.5  -0.5  -0.5
//! ```

use std::sync::Arc;

/// Transfer function table shared between the synth that computes it and
/// the node that reads it.
#[derive(Debug, Clone, Default)]
pub struct Curve {
    points: Arc<[f32]>,
}

impl Curve {
    pub fn new(points: Vec<f32>) -> Self {
        Self {
            points: points.into(),
        }
    }

    /// Sample `f` at `n` evenly spaced inputs across [-1, 1).
    pub fn from_fn(n: usize, mut f: impl FnMut(f32) -> f32) -> Self {
        let points = (0..n)
            .map(|i| f((2 * i) as f32 / n as f32 - 1.0))
            .collect::<Vec<_>>();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f32] {
        &self.points
    }

    #[inline]
    pub fn apply(&self, input: f32) -> f32 {
        let n = self.points.len();
        match n {
            0 => input,
            1 => self.points[0],
            _ => {
                let pos = (n - 1) as f32 * (input + 1.0) * 0.5;
                if pos <= 0.0 {
                    return self.points[0];
                }
                if pos >= (n - 1) as f32 {
                    return self.points[n - 1];
                }
                let idx = pos as usize;
                let frac = pos - idx as f32;
                self.points[idx] + (self.points[idx + 1] - self.points[idx]) * frac
            }
        }
    }
}

/// Reflect a sample back into [-1, 1] as many times as needed.
#[inline]
pub fn fold(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let wraps = ((sample + sample.signum()) / 2.0).trunc();
    let folded = sample - 2.0 * wraps;
    if wraps as i64 % 2 != 0 {
        -folded
    } else {
        folded
    }
}
