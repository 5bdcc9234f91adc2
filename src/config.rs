//! Operational constants for training and sampling.
//!
//! Chain count, warm-up and thinning are configuration, not structure: every
//! field has a default matching the values the network was tuned with, and
//! any of them may be overridden from code or from a deserialized file.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration of a [`crate::network::DependencyNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of independent Gibbs chains.
    pub num_chains: usize,

    /// Raw sweeps discarded once, before the first emitted sample.
    pub warm_up: usize,

    /// Only every `thin_interval`-th raw sweep is emitted.
    pub thin_interval: usize,

    /// Global seed; chain `i` is seeded with `seed + i`. Random when `None`.
    pub seed: Option<u64>,

    /// Range used to initialize continuous variables that declare no finite range.
    pub init_range: (f64, f64),
}

pub const DEFAULT_NUM_CHAINS: usize = 10;
pub const DEFAULT_WARM_UP: usize = 500;
pub const DEFAULT_THIN_INTERVAL: usize = 100;
pub const DEFAULT_INIT_RANGE: (f64, f64) = (0.0, 10.0);

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_chains: DEFAULT_NUM_CHAINS,
            warm_up: DEFAULT_WARM_UP,
            thin_interval: DEFAULT_THIN_INTERVAL,
            seed: None,
            init_range: DEFAULT_INIT_RANGE,
        }
    }
}

impl NetworkConfig {
    pub fn with_num_chains(mut self, num_chains: usize) -> Self {
        self.num_chains = num_chains;
        self
    }

    pub fn with_warm_up(mut self, warm_up: usize) -> Self {
        self.warm_up = warm_up;
        self
    }

    pub fn with_thin_interval(mut self, thin_interval: usize) -> Self {
        self.thin_interval = thin_interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_init_range(mut self, low: f64, high: f64) -> Self {
        self.init_range = (low, high);
        self
    }

    /// Checks that the configuration can drive a sampler.
    pub fn validate(&self) -> Result<()> {
        if self.num_chains == 0 {
            return Err(Error::config("num_chains must be at least 1"));
        }
        validate_init_range(self.init_range)
    }
}

pub(crate) fn validate_init_range((low, high): (f64, f64)) -> Result<()> {
    if !(low.is_finite() && high.is_finite() && low < high) {
        return Err(Error::config(format!(
            "init_range must be finite with low < high, got ({low}, {high})"
        )));
    }
    Ok(())
}
