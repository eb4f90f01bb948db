//! Two-tier gas limit policy.

use serde::{Deserialize, Serialize};

/// Jobs whose declared cost exceeds `threshold` get the `high` gas limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasPolicy {
    pub threshold: u64,
    pub low: u64,
    pub high: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            threshold: 200,
            low: 250_000,
            high: 3_000_000,
        }
    }
}

impl GasPolicy {
    pub fn gas_limit(&self, cost: u64) -> u64 {
        if cost > self.threshold {
            self.high
        } else {
            self.low
        }
    }
}
