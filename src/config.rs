//! Engine configuration.
//!
//! Built with chained setters, the same way the CLI front end assembles it
//! from flags:
//!
//! ```
//! use saavy_toys::EngineConfig;
//!
//! let config = EngineConfig::default().sample_rate(44_100.0).seed(7);
//! assert_eq!(config.sample_rate, 44_100.0);
//! ```

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Audio clock rate in Hz.
    pub sample_rate: f32,
    /// How long before an audio-clock event its host timer wakes (seconds).
    pub schedule_lead: f64,
    /// Seed for the non-deterministic choices (pans, jitter, run voices).
    pub seed: u64,
    /// Directory holding the `adgc/`, `drum/` and `concrete/` sample sets.
    pub asset_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            schedule_lead: 0.1,
            seed: 0x5EED,
            asset_root: PathBuf::from("assets"),
        }
    }
}

impl EngineConfig {
    pub fn sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn schedule_lead(mut self, lead: f64) -> Self {
        self.schedule_lead = lead.max(0.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }
}
