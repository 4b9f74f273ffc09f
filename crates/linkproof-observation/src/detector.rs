//! Incident detection: per-sample badness flags.
//!
//! Provides:
//! - `BadnessSignal` trait for pluggable threshold checks
//! - 5 built-in signals: airtime, retry, latency, mesh flap, WAN SINR
//! - `IncidentDetector` that runs every registered signal over one sample
//!
//! A window is "bad" only when two or more independent signals fire. A single
//! flag is never enough.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::MetricSample;

/// Minimum number of independent flags for a bad window.
pub const BAD_WINDOW_MIN_FLAGS: usize = 2;

/// One independent badness signal that crossed its threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadnessFlag {
    AirtimeHigh,
    RetryHigh,
    LatSpike,
    MeshFlap,
    WanLowSinr,
}

impl BadnessFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AirtimeHigh => "AIRTIME_HIGH",
            Self::RetryHigh => "RETRY_HIGH",
            Self::LatSpike => "LAT_SPIKE",
            Self::MeshFlap => "MESH_FLAP",
            Self::WanLowSinr => "WAN_LOW_SINR",
        }
    }
}

impl fmt::Display for BadnessFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a flag set marks the window as bad.
pub fn is_bad_window(flags: &[BadnessFlag]) -> bool {
    flags.len() >= BAD_WINDOW_MIN_FLAGS
}

// ── Thresholds ──────────────────────────────────────────────────────────

fn default_airtime_busy_pct() -> f64 {
    75.0
}
fn default_retry_pct() -> f64 {
    18.0
}
fn default_latency_p95_ms() -> f64 {
    60.0
}
fn default_mesh_flaps_per_min() -> f64 {
    2.0
}
fn default_wan_sinr_floor_db() -> f64 {
    5.0
}

/// Threshold set for the built-in signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorThresholds {
    #[serde(default = "default_airtime_busy_pct")]
    pub airtime_busy_pct: f64,
    #[serde(default = "default_retry_pct")]
    pub retry_pct: f64,
    #[serde(default = "default_latency_p95_ms")]
    pub latency_p95_ms: f64,
    #[serde(default = "default_mesh_flaps_per_min")]
    pub mesh_flaps_per_min: f64,
    #[serde(default = "default_wan_sinr_floor_db")]
    pub wan_sinr_floor_db: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            airtime_busy_pct: default_airtime_busy_pct(),
            retry_pct: default_retry_pct(),
            latency_p95_ms: default_latency_p95_ms(),
            mesh_flaps_per_min: default_mesh_flaps_per_min(),
            wan_sinr_floor_db: default_wan_sinr_floor_db(),
        }
    }
}

// ── Trait ────────────────────────────────────────────────────────────────

/// A single threshold check over one sample.
///
/// Signals must ignore absent fields: an unmeasured value never fires.
pub trait BadnessSignal: Send + Sync {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag>;

    fn name(&self) -> &str;
}

fn at_or_above(value: Option<f64>, threshold: f64, flag: BadnessFlag) -> Option<BadnessFlag> {
    value.filter(|v| *v >= threshold).map(|_| flag)
}

// ── Built-in Signals ────────────────────────────────────────────────────

pub struct AirtimeHigh {
    pub threshold_pct: f64,
}

impl BadnessSignal for AirtimeHigh {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag> {
        at_or_above(sample.airtime_busy_pct, self.threshold_pct, BadnessFlag::AirtimeHigh)
    }

    fn name(&self) -> &str {
        "airtime_high"
    }
}

pub struct RetryHigh {
    pub threshold_pct: f64,
}

impl BadnessSignal for RetryHigh {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag> {
        at_or_above(sample.retry_pct, self.threshold_pct, BadnessFlag::RetryHigh)
    }

    fn name(&self) -> &str {
        "retry_high"
    }
}

pub struct LatencySpike {
    pub threshold_ms: f64,
}

impl BadnessSignal for LatencySpike {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag> {
        at_or_above(sample.latency_p95_ms, self.threshold_ms, BadnessFlag::LatSpike)
    }

    fn name(&self) -> &str {
        "latency_spike"
    }
}

pub struct MeshFlap {
    pub flaps_per_min: f64,
}

impl BadnessSignal for MeshFlap {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag> {
        at_or_above(sample.mesh_flap_count, self.flaps_per_min, BadnessFlag::MeshFlap)
    }

    fn name(&self) -> &str {
        "mesh_flap"
    }
}

/// Fires when SINR is at or *below* the floor.
pub struct WanLowSinr {
    pub floor_db: f64,
}

impl BadnessSignal for WanLowSinr {
    fn check(&self, sample: &MetricSample) -> Option<BadnessFlag> {
        sample
            .wan_sinr_db
            .filter(|v| *v <= self.floor_db)
            .map(|_| BadnessFlag::WanLowSinr)
    }

    fn name(&self) -> &str {
        "wan_low_sinr"
    }
}

// ── Detector ────────────────────────────────────────────────────────────

/// Runs all registered signals over a sample.
pub struct IncidentDetector {
    signals: Vec<Box<dyn BadnessSignal>>,
}

impl IncidentDetector {
    /// Detector with the five built-in signals.
    pub fn new(thresholds: &DetectorThresholds) -> Self {
        Self {
            signals: vec![
                Box::new(AirtimeHigh {
                    threshold_pct: thresholds.airtime_busy_pct,
                }),
                Box::new(RetryHigh {
                    threshold_pct: thresholds.retry_pct,
                }),
                Box::new(LatencySpike {
                    threshold_ms: thresholds.latency_p95_ms,
                }),
                Box::new(MeshFlap {
                    flaps_per_min: thresholds.mesh_flaps_per_min,
                }),
                Box::new(WanLowSinr {
                    floor_db: thresholds.wan_sinr_floor_db,
                }),
            ],
        }
    }

    /// Detector with no signals; register them with [`Self::with_signal`].
    pub fn empty() -> Self {
        Self { signals: vec![] }
    }

    pub fn with_signal(mut self, signal: Box<dyn BadnessSignal>) -> Self {
        self.signals.push(signal);
        self
    }

    /// Flags raised by the sample, deduplicated, in registration order.
    pub fn detect(&self, sample: &MetricSample) -> Vec<BadnessFlag> {
        let mut flags = Vec::new();
        for signal in &self.signals {
            if let Some(flag) = signal.check(sample) {
                if !flags.contains(&flag) {
                    flags.push(flag);
                }
            }
        }
        flags
    }

    pub fn signal_names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name()).collect()
    }
}

impl Default for IncidentDetector {
    fn default() -> Self {
        Self::new(&DetectorThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windowing::WindowRef;
    use chrono::Utc;

    fn sample() -> MetricSample {
        MetricSample::new(Utc::now(), WindowRef("Ws:0".into()))
    }

    #[test]
    fn empty_sample_raises_nothing() {
        let d = IncidentDetector::default();
        assert!(d.detect(&sample()).is_empty());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let d = IncidentDetector::default();
        let mut s = sample();
        s.airtime_busy_pct = Some(75.0);
        s.retry_pct = Some(18.0);
        s.latency_p95_ms = Some(60.0);
        s.mesh_flap_count = Some(2.0);
        s.wan_sinr_db = Some(5.0);
        assert_eq!(
            d.detect(&s),
            vec![
                BadnessFlag::AirtimeHigh,
                BadnessFlag::RetryHigh,
                BadnessFlag::LatSpike,
                BadnessFlag::MeshFlap,
                BadnessFlag::WanLowSinr,
            ]
        );
    }

    #[test]
    fn just_below_threshold_does_not_fire() {
        let d = IncidentDetector::default();
        let mut s = sample();
        s.airtime_busy_pct = Some(74.9);
        s.retry_pct = Some(17.9);
        s.latency_p95_ms = Some(59.9);
        s.mesh_flap_count = Some(1.9);
        s.wan_sinr_db = Some(5.1);
        assert!(d.detect(&s).is_empty());
    }

    #[test]
    fn one_flag_is_never_bad() {
        let d = IncidentDetector::default();
        let mut s = sample();
        s.latency_p95_ms = Some(500.0);
        let flags = d.detect(&s);
        assert_eq!(flags, vec![BadnessFlag::LatSpike]);
        assert!(!is_bad_window(&flags));
    }

    #[test]
    fn two_flags_make_a_bad_window() {
        let d = IncidentDetector::default();
        let mut s = sample();
        s.latency_p95_ms = Some(80.0);
        s.retry_pct = Some(25.0);
        assert!(is_bad_window(&d.detect(&s)));
    }

    #[test]
    fn zero_values_are_measurements() {
        let d = IncidentDetector::default();
        let mut s = sample();
        s.wan_sinr_db = Some(0.0);
        assert_eq!(d.detect(&s), vec![BadnessFlag::WanLowSinr]);
    }

    #[test]
    fn custom_signal_can_be_registered() {
        struct AlwaysLatency;
        impl BadnessSignal for AlwaysLatency {
            fn check(&self, _: &MetricSample) -> Option<BadnessFlag> {
                Some(BadnessFlag::LatSpike)
            }
            fn name(&self) -> &str {
                "always"
            }
        }
        let d = IncidentDetector::empty()
            .with_signal(Box::new(AlwaysLatency))
            .with_signal(Box::new(AlwaysLatency));
        assert_eq!(d.detect(&sample()), vec![BadnessFlag::LatSpike]);
        assert_eq!(d.signal_names(), vec!["always", "always"]);
    }

    #[test]
    fn flag_serde_matches_display() {
        let json = serde_json::to_string(&BadnessFlag::WanLowSinr).unwrap();
        assert_eq!(json, format!("\"{}\"", BadnessFlag::WanLowSinr));
    }
}
