//! Configuration for the observation runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorThresholds;
use crate::episode::EpisodeClosePolicy;
use crate::error::{ObservationError, ObservationResult};
use crate::history::HistoryCapacity;
use crate::readiness::ReadinessThresholds;
use crate::windowing::WindowPolicy;

/// Main runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sampling period in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Run on simulated time: ticks fire back-to-back and the sample clock
    /// advances by one interval per tick
    #[serde(default)]
    pub accelerate: bool,

    #[serde(default)]
    pub windows: WindowPolicy,

    #[serde(default)]
    pub history: HistoryCapacity,

    #[serde(default)]
    pub detector: DetectorThresholds,

    #[serde(default)]
    pub episodes: EpisodeClosePolicy,

    #[serde(default)]
    pub readiness: ReadinessThresholds,
}

fn default_sample_interval_ms() -> u64 {
    10_000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            accelerate: false,
            windows: WindowPolicy::default(),
            history: HistoryCapacity::default(),
            detector: DetectorThresholds::default(),
            episodes: EpisodeClosePolicy::default(),
            readiness: ReadinessThresholds::default(),
        }
    }
}

impl RuntimeConfig {
    /// Accelerated configuration for tests and replays.
    pub fn accelerated() -> Self {
        Self {
            accelerate: true,
            ..Self::default()
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn validate(&self) -> ObservationResult<()> {
        if self.sample_interval_ms == 0 {
            return Err(ObservationError::InvalidConfig {
                field: "sample_interval_ms".into(),
                detail: "must be greater than zero".into(),
            });
        }
        if self.history.event_capacity == 0 || self.history.snapshot_capacity == 0 {
            return Err(ObservationError::InvalidConfig {
                field: "history".into(),
                detail: "event and snapshot capacities must be greater than zero".into(),
            });
        }
        if self.readiness.min_samples == 0 {
            return Err(ObservationError::InvalidConfig {
                field: "readiness.min_samples".into(),
                detail: "must be greater than zero".into(),
            });
        }
        self.windows.validate()
    }
}
