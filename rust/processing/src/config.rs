// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration.

use std::time::Duration;

use bimclash_core::LengthUnit;
use bimclash_detect::DetectionConfig;
use bimclash_rules::{CostBook, EngineConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Resource limits of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Wall-clock limit for the whole run in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Ceiling on the accounted working set in bytes.
    pub memory_ceiling_bytes: Option<u64>,
    /// Threads of the dedicated worker pool.
    pub worker_threads: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            memory_ceiling_bytes: None,
            worker_threads: num_cpus::get(),
        }
    }
}

impl RunLimits {
    /// Load limits from environment variables.
    ///
    /// `BIMCLASH_TIMEOUT_SECS` and `BIMCLASH_MEMORY_CEILING_MB` are unlimited
    /// when unset or zero.
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("BIMCLASH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .unwrap_or(0);
        let memory_ceiling_mb: u64 = std::env::var("BIMCLASH_MEMORY_CEILING_MB")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .unwrap_or(0);
        Self {
            timeout_ms: (timeout_secs > 0).then(|| timeout_secs.saturating_mul(1000)),
            memory_ceiling_bytes: (memory_ceiling_mb > 0).then(|| memory_ceiling_mb.saturating_mul(1024 * 1024)),
            worker_threads: std::env::var("BIMCLASH_WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .unwrap_or_else(|_| num_cpus::get()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_memory_ceiling(mut self, bytes: u64) -> Self {
        self.memory_ceiling_bytes = Some(bytes);
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Workers("worker_threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Everything a run needs besides its inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Unit of incoming coordinates
    pub unit: LengthUnit,
    pub detection: DetectionConfig,
    pub engine: EngineConfig,
    pub costs: CostBook,
    pub limits: RunLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unlimited() {
        let limits = RunLimits::default();
        assert!(limits.timeout().is_none());
        assert!(limits.memory_ceiling_bytes.is_none());
        assert!(limits.worker_threads >= 1);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(RunLimits::default().with_worker_threads(0).validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"unit":"meter","limits":{"timeout_ms":1000}}"#).unwrap();
        assert_eq!(config.unit, LengthUnit::Meter);
        assert_eq!(config.limits.timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.detection, DetectionConfig::default());
    }
}
