//! Install readiness scoring.
//!
//! Independent of the episode pipeline: takes the recent sample window,
//! averages each metric, and applies ordered hard-failure checks (WAN, mesh,
//! Wi-Fi, then residual loss/latency). The first failing group decides the
//! dominant factor. When nothing fails, a strict pass test separates PASS
//! from MARGINAL.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DnsStatus, MetricSample};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessVerdict {
    Pass,
    Marginal,
    Fail,
}

impl fmt::Display for ReadinessVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Marginal => "MARGINAL",
            Self::Fail => "FAIL",
        };
        f.write_str(s)
    }
}

/// Which part of the path most likely decides the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DominantFactor {
    Wan,
    Mesh,
    Wifi,
    Opaque,
    Unknown,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClosureReadiness {
    Ready,
    NotReady,
}

/// Readiness window and thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessThresholds {
    pub window_secs: u64,
    pub min_samples: usize,

    pub wan_sinr_min_db: f64,
    /// Share of DNS-reporting samples that must fail for DNS to count as failing.
    pub dns_fail_share: f64,
    pub mesh_flap_max: f64,
    pub airtime_fail_pct: f64,
    pub retry_fail_pct: f64,
    pub signal_min_pct: f64,
    pub phy_rate_min_mbps: f64,
    pub loss_fail_pct: f64,
    pub latency_fail_ms: f64,

    pub pass_loss_pct: f64,
    pub pass_latency_ms: f64,
    pub pass_retry_pct: f64,
    pub pass_mesh_flap: f64,
}

impl Default for ReadinessThresholds {
    fn default() -> Self {
        Self {
            window_secs: 180,
            min_samples: 6,
            wan_sinr_min_db: 5.0,
            dns_fail_share: 0.5,
            mesh_flap_max: 2.0,
            airtime_fail_pct: 80.0,
            retry_fail_pct: 25.0,
            signal_min_pct: 30.0,
            phy_rate_min_mbps: 50.0,
            loss_fail_pct: 3.0,
            latency_fail_ms: 150.0,
            pass_loss_pct: 1.0,
            pass_latency_ms: 60.0,
            pass_retry_pct: 12.0,
            pass_mesh_flap: 1.0,
        }
    }
}

/// Result of one readiness evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub verdict: ReadinessVerdict,
    pub dominant_factor: DominantFactor,
    pub confidence: f64,
    pub sample_count: usize,
    pub reason_codes: Vec<String>,
    /// Mean of every metric that had at least one value in the window.
    pub means: BTreeMap<String, f64>,
    pub closure_readiness: ClosureReadiness,
}

#[derive(Default)]
struct WindowMeans {
    latency: Option<f64>,
    loss: Option<f64>,
    retry: Option<f64>,
    airtime: Option<f64>,
    mesh_flap: Option<f64>,
    sinr: Option<f64>,
    signal: Option<f64>,
    phy_rate: Option<f64>,
    dns_failing: bool,
}

fn mean_of(samples: &[&MetricSample], f: impl Fn(&MetricSample) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = samples.iter().filter_map(|s| f(s)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Install readiness scorer.
#[derive(Clone, Debug, Default)]
pub struct ReadinessScorer {
    thresholds: ReadinessThresholds,
}

impl ReadinessScorer {
    pub fn new(thresholds: ReadinessThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ReadinessThresholds {
        &self.thresholds
    }

    /// Score the recent window of `samples` (chronological order).
    pub fn score(&self, samples: &[MetricSample]) -> ReadinessResult {
        let th = &self.thresholds;
        let window = self.select_window(samples);
        let n = window.len();

        if n == 0 {
            return ReadinessResult {
                verdict: ReadinessVerdict::Fail,
                dominant_factor: DominantFactor::Unknown,
                confidence: 0.2,
                sample_count: 0,
                reason_codes: vec!["NO_SAMPLES".into()],
                means: BTreeMap::new(),
                closure_readiness: ClosureReadiness::NotReady,
            };
        }

        let m = self.window_means(&window);
        let means = means_map(&m);

        let above = |v: Option<f64>, limit: f64| v.is_some_and(|x| x >= limit);
        let below = |v: Option<f64>, limit: f64| v.is_some_and(|x| x < limit);

        let mut reasons = Vec::new();
        let (verdict, factor, base) = 'decide: {
            if below(m.sinr, th.wan_sinr_min_db) {
                reasons.push("WAN_SINR_LOW".to_string());
            }
            if m.dns_failing {
                reasons.push("DNS_FAIL".to_string());
            }
            if !reasons.is_empty() {
                break 'decide (ReadinessVerdict::Fail, DominantFactor::Wan, 0.8);
            }

            if above(m.mesh_flap, th.mesh_flap_max) {
                reasons.push("MESH_FLAP_HIGH".to_string());
                break 'decide (ReadinessVerdict::Fail, DominantFactor::Mesh, 0.75);
            }

            if above(m.airtime, th.airtime_fail_pct) {
                reasons.push("AIRTIME_HIGH".to_string());
            }
            if above(m.retry, th.retry_fail_pct) {
                reasons.push("RETRY_HIGH".to_string());
            }
            if below(m.signal, th.signal_min_pct) {
                reasons.push("SIGNAL_WEAK".to_string());
            }
            if below(m.phy_rate, th.phy_rate_min_mbps) {
                reasons.push("LINK_RATE_LOW".to_string());
            }
            if !reasons.is_empty() {
                break 'decide (ReadinessVerdict::Fail, DominantFactor::Wifi, 0.7);
            }

            if above(m.loss, th.loss_fail_pct) {
                reasons.push("LOSS_HIGH".to_string());
            }
            if above(m.latency, th.latency_fail_ms) {
                reasons.push("LATENCY_HIGH".to_string());
            }
            if !reasons.is_empty() {
                break 'decide (ReadinessVerdict::Fail, DominantFactor::Opaque, 0.6);
            }

            // strict pass: latency and loss must be measured and within bounds
            match (m.latency, m.loss) {
                (Some(lat), Some(loss)) => {
                    if loss > th.pass_loss_pct {
                        reasons.push("LOSS_ABOVE_PASS".to_string());
                    }
                    if lat > th.pass_latency_ms {
                        reasons.push("LATENCY_ABOVE_PASS".to_string());
                    }
                }
                _ => reasons.push("METRICS_INCOMPLETE".to_string()),
            }
            if m.retry.is_some_and(|r| r > th.pass_retry_pct) {
                reasons.push("RETRY_ABOVE_PASS".to_string());
            }
            if m.mesh_flap.is_some_and(|f| f > th.pass_mesh_flap) {
                reasons.push("MESH_FLAP_ABOVE_PASS".to_string());
            }

            if reasons.is_empty() {
                reasons.push("ALL_CHECKS_PASSED".to_string());
                (ReadinessVerdict::Pass, DominantFactor::None, 0.8)
            } else {
                (ReadinessVerdict::Marginal, DominantFactor::Unknown, 0.6)
            }
        };

        let extra = n.saturating_sub(th.min_samples) as f64;
        let confidence = f64::min(base + f64::min(0.01 * extra, 0.15), 0.95);

        ReadinessResult {
            verdict,
            dominant_factor: factor,
            confidence,
            sample_count: n,
            reason_codes: reasons,
            means,
            closure_readiness: if verdict == ReadinessVerdict::Pass {
                ClosureReadiness::Ready
            } else {
                ClosureReadiness::NotReady
            },
        }
    }

    /// Samples within `window_secs` of the newest one, padded from older
    /// history up to `min_samples` when the window is too thin.
    fn select_window<'a>(&self, samples: &'a [MetricSample]) -> Vec<&'a MetricSample> {
        let Some(latest) = samples.last() else {
            return vec![];
        };
        let cutoff = latest.ts - chrono::Duration::seconds(self.thresholds.window_secs as i64);
        let in_window = samples.iter().filter(|s| s.ts >= cutoff).count();
        let take = in_window.max(self.thresholds.min_samples).min(samples.len());
        samples[samples.len() - take..].iter().collect()
    }

    fn window_means(&self, window: &[&MetricSample]) -> WindowMeans {
        let reporting: Vec<DnsStatus> = window.iter().filter_map(|s| s.dns_status).collect();
        let failing = reporting.iter().filter(|d| **d == DnsStatus::Fail).count();
        let dns_failing = !reporting.is_empty()
            && failing as f64 / reporting.len() as f64 >= self.thresholds.dns_fail_share;

        WindowMeans {
            latency: mean_of(window, |s| s.latency_p95_ms),
            loss: mean_of(window, |s| s.loss_pct),
            retry: mean_of(window, |s| s.retry_pct),
            airtime: mean_of(window, |s| s.airtime_busy_pct),
            mesh_flap: mean_of(window, |s| s.mesh_flap_count),
            sinr: mean_of(window, |s| s.wan_sinr_db),
            signal: mean_of(window, |s| s.signal_strength_pct),
            phy_rate: mean_of(window, |s| s.phy_rate_mbps),
            dns_failing,
        }
    }
}

fn means_map(m: &WindowMeans) -> BTreeMap<String, f64> {
    [
        ("latency_p95_ms", m.latency),
        ("loss_pct", m.loss),
        ("retry_pct", m.retry),
        ("airtime_busy_pct", m.airtime),
        ("mesh_flap_count", m.mesh_flap),
        ("wan_sinr_db", m.sinr),
        ("signal_strength_pct", m.signal),
        ("phy_rate_mbps", m.phy_rate),
    ]
    .into_iter()
    .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windowing::WindowRef;
    use chrono::{TimeZone, Utc};

    fn healthy(i: i64) -> MetricSample {
        let ts = Utc.timestamp_opt(1_700_000_000 + i * 10, 0).unwrap();
        let mut s = MetricSample::new(ts, WindowRef(format!("Ws:{}", ts.timestamp())));
        s.latency_p95_ms = Some(25.0);
        s.loss_pct = Some(0.2);
        s.retry_pct = Some(5.0);
        s.airtime_busy_pct = Some(30.0);
        s.mesh_flap_count = Some(0.0);
        s.wan_sinr_db = Some(18.0);
        s.signal_strength_pct = Some(80.0);
        s.phy_rate_mbps = Some(600.0);
        s.dns_status = Some(DnsStatus::Ok);
        s
    }

    fn window(n: i64, tweak: impl Fn(&mut MetricSample)) -> Vec<MetricSample> {
        (0..n)
            .map(|i| {
                let mut s = healthy(i);
                tweak(&mut s);
                s
            })
            .collect()
    }

    fn scorer() -> ReadinessScorer {
        ReadinessScorer::default()
    }

    #[test]
    fn empty_window_fails_with_low_confidence() {
        let r = scorer().score(&[]);
        assert_eq!(r.verdict, ReadinessVerdict::Fail);
        assert_eq!(r.dominant_factor, DominantFactor::Unknown);
        assert_eq!(r.sample_count, 0);
        assert!((r.confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn healthy_window_passes() {
        let r = scorer().score(&window(18, |_| {}));
        assert_eq!(r.verdict, ReadinessVerdict::Pass);
        assert_eq!(r.dominant_factor, DominantFactor::None);
        assert_eq!(r.closure_readiness, ClosureReadiness::Ready);
        assert_eq!(r.reason_codes, vec!["ALL_CHECKS_PASSED"]);
        assert!((r.means["latency_p95_ms"] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn low_sinr_is_wan_failure_even_with_bad_wifi() {
        let r = scorer().score(&window(10, |s| {
            s.wan_sinr_db = Some(2.0);
            s.retry_pct = Some(40.0);
        }));
        assert_eq!(r.verdict, ReadinessVerdict::Fail);
        assert_eq!(r.dominant_factor, DominantFactor::Wan);
        assert_eq!(r.reason_codes, vec!["WAN_SINR_LOW"]);
    }

    #[test]
    fn dns_majority_failure_is_wan() {
        let mut samples = window(10, |_| {});
        for s in samples.iter_mut().take(6) {
            s.dns_status = Some(DnsStatus::Fail);
        }
        let r = scorer().score(&samples);
        assert_eq!(r.dominant_factor, DominantFactor::Wan);
        assert!(r.reason_codes.contains(&"DNS_FAIL".to_string()));
    }

    #[test]
    fn mesh_checked_before_wifi() {
        let r = scorer().score(&window(10, |s| {
            s.mesh_flap_count = Some(3.0);
            s.airtime_busy_pct = Some(95.0);
        }));
        assert_eq!(r.dominant_factor, DominantFactor::Mesh);
    }

    #[test]
    fn weak_signal_is_wifi_failure() {
        let r = scorer().score(&window(10, |s| {
            s.signal_strength_pct = Some(20.0);
            s.phy_rate_mbps = Some(20.0);
        }));
        assert_eq!(r.dominant_factor, DominantFactor::Wifi);
        assert_eq!(r.reason_codes, vec!["SIGNAL_WEAK", "LINK_RATE_LOW"]);
    }

    #[test]
    fn residual_loss_is_opaque() {
        let r = scorer().score(&window(10, |s| s.loss_pct = Some(4.0)));
        assert_eq!(r.dominant_factor, DominantFactor::Opaque);
        assert_eq!(r.reason_codes, vec!["LOSS_HIGH"]);
    }

    #[test]
    fn between_pass_and_fail_is_marginal() {
        let r = scorer().score(&window(10, |s| s.latency_p95_ms = Some(90.0)));
        assert_eq!(r.verdict, ReadinessVerdict::Marginal);
        assert_eq!(r.closure_readiness, ClosureReadiness::NotReady);
        assert_eq!(r.reason_codes, vec!["LATENCY_ABOVE_PASS"]);
    }

    #[test]
    fn unmeasured_latency_cannot_pass() {
        let r = scorer().score(&window(10, |s| s.latency_p95_ms = None));
        assert_eq!(r.verdict, ReadinessVerdict::Marginal);
        assert_eq!(r.reason_codes, vec!["METRICS_INCOMPLETE"]);
    }

    #[test]
    fn window_excludes_stale_samples() {
        let mut samples = window(30, |s| s.loss_pct = Some(9.0));
        // 20 fresh healthy samples 10 minutes later, 10 s apart: 19 in window
        let base = samples.last().unwrap().ts + chrono::Duration::seconds(600);
        for i in 0..20 {
            let mut s = healthy(0);
            s.ts = base + chrono::Duration::seconds(i * 10);
            samples.push(s);
        }
        let r = scorer().score(&samples);
        assert_eq!(r.sample_count, 19);
        assert_eq!(r.verdict, ReadinessVerdict::Pass);
    }

    #[test]
    fn thin_window_is_padded_to_min_samples() {
        let mut samples = window(10, |_| {});
        let mut late = healthy(0);
        late.ts = samples.last().unwrap().ts + chrono::Duration::seconds(3600);
        samples.push(late);
        let r = scorer().score(&samples);
        assert_eq!(r.sample_count, 6);
    }

    #[test]
    fn confidence_grows_with_samples_and_is_capped() {
        let small = scorer().score(&window(6, |_| {}));
        let large = scorer().score(&window(18, |_| {}));
        assert!(large.confidence > small.confidence);
        let th = ReadinessThresholds {
            window_secs: 100_000,
            ..Default::default()
        };
        let huge = ReadinessScorer::new(th).score(&window(500, |_| {}));
        assert!(huge.confidence <= 0.95);
    }
}
