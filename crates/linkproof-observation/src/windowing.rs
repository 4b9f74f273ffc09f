//! Window references: period-aligned time buckets.
//!
//! Samples, change events and snapshots are correlated through a window
//! reference string of the form `"{kind}:{bucket_start_epoch}"`, e.g.
//! `"Ws:1700000000"`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ObservationError, ObservationResult};

/// Identifier of one period-aligned time bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowRef(pub String);

impl WindowRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Window granularity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKind {
    /// Coarse correlation bucket (default 10 s).
    Short,
    /// Fine incident bucket (default 60 s).
    Long,
}

impl WindowKind {
    /// Prefix used in the window reference string.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Short => "Ws",
            Self::Long => "Wl",
        }
    }
}

fn default_short_secs() -> u64 {
    10
}

fn default_long_secs() -> u64 {
    60
}

/// Bucket periods for both window kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    #[serde(default = "default_short_secs")]
    pub short_secs: u64,
    #[serde(default = "default_long_secs")]
    pub long_secs: u64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            short_secs: default_short_secs(),
            long_secs: default_long_secs(),
        }
    }
}

impl WindowPolicy {
    /// Reject zero-length periods.
    pub fn validate(&self) -> ObservationResult<()> {
        if self.short_secs == 0 || self.long_secs == 0 {
            return Err(ObservationError::InvalidConfig {
                field: "window_policy".into(),
                detail: "window periods must be at least one second".into(),
            });
        }
        Ok(())
    }

    /// Period in seconds for a window kind.
    pub fn period_secs(&self, kind: WindowKind) -> u64 {
        match kind {
            WindowKind::Short => self.short_secs,
            WindowKind::Long => self.long_secs,
        }
    }

    /// Start of the bucket containing `ts`, as epoch seconds.
    pub fn bucket_start(&self, ts: DateTime<Utc>, kind: WindowKind) -> i64 {
        let period = self.period_secs(kind).max(1) as i64;
        ts.timestamp().div_euclid(period) * period
    }

    /// Window reference for the bucket containing `ts`.
    pub fn window_ref(&self, ts: DateTime<Utc>, kind: WindowKind) -> WindowRef {
        WindowRef(format!("{}:{}", kind.prefix(), self.bucket_start(ts, kind)))
    }
}
