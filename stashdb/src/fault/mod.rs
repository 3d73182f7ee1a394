// Simulated latency and random failures for exercising callers

use crate::error::{Result, StashDbError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fault-injection settings. Both knobs default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultConfig {
    /// Probability in `[0, 1]` that an operation fails with `STORAGE_ERROR`.
    #[serde(default, alias = "error_rate")]
    pub error_rate: f64,
    /// Artificial delay before every operation, in milliseconds.
    #[serde(default, alias = "simulate_delay")]
    pub simulate_delay: u64,
}

impl FaultConfig {
    pub fn is_active(&self) -> bool {
        self.error_rate > 0.0 || self.simulate_delay > 0
    }

    /// Run before an operation touches storage: sleep for the configured
    /// delay, then draw against the error rate.
    pub async fn before_operation(&self) -> Result<()> {
        if self.simulate_delay > 0 {
            tokio::time::sleep(Duration::from_millis(self.simulate_delay)).await;
        }
        self.draw()
    }

    fn draw(&self) -> Result<()> {
        if self.error_rate > 0.0 && rand::random::<f64>() < self.error_rate {
            log::warn!("Injected storage failure (error_rate = {})", self.error_rate);
            return Err(StashDbError::InjectedFault);
        }
        Ok(())
    }
}
