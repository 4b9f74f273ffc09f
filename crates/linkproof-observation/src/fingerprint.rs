//! Offline fingerprint analysis of an exported bundle.
//!
//! The metric timeline is cut into before/during/after slices around the
//! peak-latency point (or into equal thirds when no latency was recorded),
//! each slice is summarised by per-metric means, and the latency shape is
//! labelled as drift, stability, oscillation or boundary.
//!
//! Read-only: the bundle is never modified.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bundle::EvidenceBundle;
use crate::episode::EpisodeId;
use crate::timeline::MetricPoint;

/// Metrics summarised per slice.
pub const KEY_METRICS: [&str; 6] = [
    "latency_p95_ms",
    "loss_pct",
    "retry_pct",
    "airtime_busy_pct",
    "mesh_flap_count",
    "wan_sinr_db",
];

fn metric_value(point: &MetricPoint, name: &str) -> Option<f64> {
    match name {
        "latency_p95_ms" => point.latency_p95_ms,
        "loss_pct" => point.loss_pct,
        "retry_pct" => point.retry_pct,
        "airtime_busy_pct" => point.airtime_busy_pct,
        "mesh_flap_count" => point.mesh_flap_count,
        "wan_sinr_db" => point.wan_sinr_db,
        _ => None,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum SplitMethod {
    PeakLatency { peak_index: usize },
    EqualThirds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLabel {
    /// Level shifted between the start and the end of the record.
    Drift,
    Stability,
    /// Latency keeps changing direction.
    Oscillation,
    /// Excursion confined to the during slice; edges agree.
    Boundary,
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Drift => "drift",
            Self::Stability => "stability",
            Self::Oscillation => "oscillation",
            Self::Boundary => "boundary",
        };
        f.write_str(s)
    }
}

/// Summary of one slice. `means` only holds metrics with at least one value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceSummary {
    pub points: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub means: BTreeMap<String, f64>,
}

impl SliceSummary {
    fn of(points: &[MetricPoint]) -> Self {
        let means = KEY_METRICS
            .iter()
            .filter_map(|name| {
                mean(points.iter().filter_map(|p| metric_value(p, name)))
                    .map(|m| (name.to_string(), m))
            })
            .collect();
        Self {
            points: points.len(),
            start: points.first().map(|p| p.t),
            end: points.last().map(|p| p.t),
            means,
        }
    }

    fn latency(&self) -> Option<f64> {
        self.means.get("latency_p95_ms").copied()
    }
}

/// Before/during/after comparison of one bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub episode_id: Option<EpisodeId>,
    pub point_count: usize,
    pub split: SplitMethod,
    pub before: SliceSummary,
    pub during: SliceSummary,
    pub after: SliceSummary,
    pub pattern: PatternLabel,
    pub confidence: f64,
}

/// Heuristics for the pattern label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintAnalyzer {
    /// Relative change between the first and last third of the latency
    /// series that counts as drift.
    pub drift_ratio: f64,
    /// Relative during-vs-edges deviation that counts as a bounded excursion.
    pub excursion_ratio: f64,
    /// Share of direction changes among successive latency deltas.
    pub oscillation_ratio: f64,
    /// Minimum (max - min) / mean latency spread for oscillation.
    pub oscillation_spread: f64,
}

impl Default for FingerprintAnalyzer {
    fn default() -> Self {
        Self {
            drift_ratio: 0.25,
            excursion_ratio: 0.25,
            oscillation_ratio: 0.6,
            oscillation_spread: 0.2,
        }
    }
}

impl FingerprintAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, bundle: &EvidenceBundle) -> Fingerprint {
        let mut fp = self.analyze_points(&bundle.timeline.metrics_points);
        fp.episode_id = Some(bundle.episode_id.clone());
        fp
    }

    pub fn analyze_points(&self, points: &[MetricPoint]) -> Fingerprint {
        let n = points.len();
        let (split, before, during, after) = match peak_latency_index(points) {
            Some(peak) => {
                let radius = (n / 6).max(1);
                let start = peak.saturating_sub(radius);
                let end = (peak + radius + 1).min(n);
                (
                    SplitMethod::PeakLatency { peak_index: peak },
                    &points[..start],
                    &points[start..end],
                    &points[end..],
                )
            }
            None => {
                let a = n / 3;
                let b = 2 * n / 3;
                (
                    SplitMethod::EqualThirds,
                    &points[..a],
                    &points[a..b],
                    &points[b..],
                )
            }
        };

        let before = SliceSummary::of(before);
        let during = SliceSummary::of(during);
        let after = SliceSummary::of(after);
        let latencies: Vec<f64> = points.iter().filter_map(|p| p.latency_p95_ms).collect();
        let (pattern, confidence) = self.label(&latencies, &before, &during, &after);

        Fingerprint {
            episode_id: None,
            point_count: n,
            split,
            before,
            during,
            after,
            pattern,
            confidence,
        }
    }

    fn label(
        &self,
        latencies: &[f64],
        before: &SliceSummary,
        during: &SliceSummary,
        after: &SliceSummary,
    ) -> (PatternLabel, f64) {
        if latencies.len() < 3 {
            return (PatternLabel::Stability, 0.3);
        }
        let boost = if latencies.len() >= 30 { 0.1 } else { 0.0 };
        let conf = |base: f64| f64::min(base + boost, 0.9);

        if self.oscillates(latencies) {
            return (PatternLabel::Oscillation, conf(0.6));
        }

        // level shift across the whole record, independent of where the peak sits
        let third = latencies.len() / 3;
        let head = mean(latencies[..third].iter().copied());
        let tail = mean(latencies[latencies.len() - third..].iter().copied());
        if let (Some(h), Some(t)) = (head, tail) {
            if relative_change(h, t) >= self.drift_ratio {
                return (PatternLabel::Drift, conf(0.65));
            }
        }

        let (b, d, a) = (before.latency(), during.latency(), after.latency());

        let edges: Vec<f64> = [b, a].into_iter().flatten().collect();
        if let (Some(d), Some(edge)) = (d, mean(edges.into_iter())) {
            if relative_change(edge, d) >= self.excursion_ratio {
                return (PatternLabel::Boundary, conf(0.6));
            }
        }

        (PatternLabel::Stability, conf(0.7))
    }

    fn oscillates(&self, latencies: &[f64]) -> bool {
        let deltas: Vec<f64> = latencies
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| d.abs() > f64::EPSILON)
            .collect();
        if deltas.len() < 4 {
            return false;
        }
        let flips = deltas
            .windows(2)
            .filter(|w| w[0].signum() != w[1].signum())
            .count();
        let ratio = flips as f64 / (deltas.len() - 1) as f64;

        let max = latencies.iter().cloned().fold(f64::MIN, f64::max);
        let min = latencies.iter().cloned().fold(f64::MAX, f64::min);
        let avg = mean(latencies.iter().copied()).unwrap_or(0.0);
        let spread = (max - min) / avg.abs().max(1.0);

        ratio >= self.oscillation_ratio && spread >= self.oscillation_spread
    }
}

fn relative_change(from: f64, to: f64) -> f64 {
    (to - from).abs() / from.abs().max(1.0)
}

/// Index of the first point with the highest latency.
fn peak_latency_index(points: &[MetricPoint]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        if let Some(v) = p.latency_p95_ms {
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((i, v));
            }
        }
    }
    best.map(|(i, _)| i)
}
