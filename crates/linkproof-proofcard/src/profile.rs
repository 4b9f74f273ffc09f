//! Evaluation profiles and the profile registry.
//!
//! A profile names the minimum sample count for a card and the checks run on
//! the percentile maps. Unknown profile references resolve to the base
//! profile.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::card::{CardVerdict, Facet};
use crate::metrics::unit_of;

/// Percentiles per canonical metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: BTreeMap<String, f64>,
    pub p95: BTreeMap<String, f64>,
    pub p5: BTreeMap<String, f64>,
}

impl Percentiles {
    /// p95 of `metric`, 0 when the metric was not measured.
    pub fn p95_or_zero(&self, metric: &str) -> f64 {
        self.p95.get(metric).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.p50.is_empty()
    }
}

/// Render one percentile map as facets named `{metric}_{suffix}`.
pub fn facets(map: &BTreeMap<String, f64>, suffix: &str) -> Vec<Facet> {
    map.iter()
        .map(|(k, v)| Facet::new(format!("{k}_{suffix}"), *v, unit_of(k)))
        .collect()
}

// ── Profile Trait ───────────────────────────────────────────────────────

/// A named evaluation profile.
pub trait Profile: Send + Sync {
    fn profile_ref(&self) -> &str;

    fn min_samples(&self) -> usize;

    /// Reason codes for every failed check. Empty means the window passes.
    fn check(&self, p: &Percentiles) -> Vec<String>;

    /// Facets summarising the outcome: p95 for failing windows, p50 for
    /// passing ones.
    fn outcome_facets(&self, verdict: CardVerdict, p: &Percentiles) -> Vec<Facet> {
        match verdict {
            CardVerdict::Ready => facets(&p.p50, "p50"),
            _ => facets(&p.p95, "p95"),
        }
    }
}

/// Default profile: no checks.
#[derive(Clone, Debug)]
pub struct BaseProfile {
    pub min_samples: usize,
}

impl Default for BaseProfile {
    fn default() -> Self {
        Self { min_samples: 10 }
    }
}

impl Profile for BaseProfile {
    fn profile_ref(&self) -> &str {
        "BASE"
    }

    fn min_samples(&self) -> usize {
        self.min_samples
    }

    fn check(&self, _p: &Percentiles) -> Vec<String> {
        vec![]
    }
}

/// Wi-Fi 7 install acceptance.
#[derive(Clone, Debug)]
pub struct Wifi78InstallAccept {
    pub rtt_p95_max_ms: f64,
    pub loss_p95_max_pct: f64,
}

impl Default for Wifi78InstallAccept {
    fn default() -> Self {
        Self {
            rtt_p95_max_ms: 80.0,
            loss_p95_max_pct: 1.0,
        }
    }
}

impl Profile for Wifi78InstallAccept {
    fn profile_ref(&self) -> &str {
        "WIFI78_INSTALL_ACCEPT"
    }

    fn min_samples(&self) -> usize {
        10
    }

    fn check(&self, p: &Percentiles) -> Vec<String> {
        let mut reasons = Vec::new();
        if p.p95_or_zero("rtt_ms") > self.rtt_p95_max_ms {
            reasons.push("P95_RTT_TOO_HIGH".to_string());
        }
        if p.p95_or_zero("loss_pct") > self.loss_p95_max_pct {
            reasons.push("P95_LOSS_TOO_HIGH".to_string());
        }
        reasons
    }
}

/// Fixed-wireless congestion suspicion: tail latency and loss.
#[derive(Clone, Debug)]
pub struct FwaCongestionSuspect {
    pub rtt_p95_max_ms: f64,
    pub loss_p95_max_pct: f64,
}

impl Default for FwaCongestionSuspect {
    fn default() -> Self {
        Self {
            rtt_p95_max_ms: 150.0,
            loss_p95_max_pct: 5.0,
        }
    }
}

impl Profile for FwaCongestionSuspect {
    fn profile_ref(&self) -> &str {
        "FWA_CONGESTION_SUSPECT"
    }

    fn min_samples(&self) -> usize {
        20
    }

    fn check(&self, p: &Percentiles) -> Vec<String> {
        let mut reasons = Vec::new();
        if p.p95_or_zero("rtt_ms") > self.rtt_p95_max_ms {
            reasons.push("TAIL_RTT_TOO_HIGH".to_string());
        }
        if p.p95_or_zero("loss_pct") > self.loss_p95_max_pct {
            reasons.push("TAIL_LOSS_TOO_HIGH".to_string());
        }
        reasons
    }
}

/// Cable upstream intermittency.
#[derive(Clone, Debug)]
pub struct CableUpstreamIntermittent {
    pub us_rtt_p95_max_ms: f64,
}

impl Default for CableUpstreamIntermittent {
    fn default() -> Self {
        Self {
            us_rtt_p95_max_ms: 150.0,
        }
    }
}

impl Profile for CableUpstreamIntermittent {
    fn profile_ref(&self) -> &str {
        "CABLE_UPSTREAM_INTERMITTENT"
    }

    fn min_samples(&self) -> usize {
        20
    }

    fn check(&self, p: &Percentiles) -> Vec<String> {
        if p.p95_or_zero("us_rtt_ms") > self.us_rtt_p95_max_ms {
            vec!["TAIL_US_RTT_TOO_HIGH".to_string()]
        } else {
            vec![]
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────────

/// Profile reference → profile, with the base profile as fallback.
pub struct ProfileRegistry {
    profiles: HashMap<String, Box<dyn Profile>>,
    fallback: BaseProfile,
}

impl ProfileRegistry {
    /// Registry with no profiles; every lookup resolves to the base profile.
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
            fallback: BaseProfile::default(),
        }
    }

    /// Registry with the built-in profiles.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Wifi78InstallAccept::default()));
        registry.register(Box::new(FwaCongestionSuspect::default()));
        registry.register(Box::new(CableUpstreamIntermittent::default()));
        registry
    }

    /// Add or replace a profile under its own reference.
    pub fn register(&mut self, profile: Box<dyn Profile>) {
        self.profiles.insert(profile.profile_ref().to_string(), profile);
    }

    /// Resolve a reference. Unknown references get the base profile.
    pub fn get(&self, profile_ref: &str) -> &dyn Profile {
        match self.profiles.get(profile_ref) {
            Some(p) => p.as_ref(),
            None => &self.fallback,
        }
    }

    pub fn contains(&self, profile_ref: &str) -> bool {
        self.profiles.contains_key(profile_ref)
    }

    /// Registered references, sorted.
    pub fn refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.profiles.keys().map(|k| k.as_str()).collect();
        refs.sort_unstable();
        refs
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p95(entries: &[(&str, f64)]) -> Percentiles {
        let map: BTreeMap<String, f64> =
            entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Percentiles {
            p50: map.clone(),
            p95: map.clone(),
            p5: map,
        }
    }

    #[test]
    fn unknown_reference_falls_back_to_base() {
        let reg = ProfileRegistry::with_builtins();
        let p = reg.get("NO_SUCH_PROFILE");
        assert_eq!(p.profile_ref(), "BASE");
        assert_eq!(p.min_samples(), 10);
        assert!(p.check(&p95(&[("rtt_ms", 9999.0)])).is_empty());
        assert!(!reg.contains("NO_SUCH_PROFILE"));
    }

    #[test]
    fn builtins_are_registered() {
        let reg = ProfileRegistry::default();
        assert_eq!(
            reg.refs(),
            vec![
                "CABLE_UPSTREAM_INTERMITTENT",
                "FWA_CONGESTION_SUSPECT",
                "WIFI78_INSTALL_ACCEPT"
            ]
        );
        assert_eq!(reg.get("FWA_CONGESTION_SUSPECT").min_samples(), 20);
    }

    #[test]
    fn wifi_checks_are_strictly_greater() {
        let p = Wifi78InstallAccept::default();
        assert!(p.check(&p95(&[("rtt_ms", 80.0), ("loss_pct", 1.0)])).is_empty());
        assert_eq!(
            p.check(&p95(&[("rtt_ms", 80.5), ("loss_pct", 1.5)])),
            vec!["P95_RTT_TOO_HIGH", "P95_LOSS_TOO_HIGH"]
        );
    }

    #[test]
    fn unmeasured_metric_never_fails() {
        assert!(CableUpstreamIntermittent::default()
            .check(&p95(&[("rtt_ms", 500.0)]))
            .is_empty());
        assert_eq!(
            CableUpstreamIntermittent::default().check(&p95(&[("us_rtt_ms", 151.0)])),
            vec!["TAIL_US_RTT_TOO_HIGH"]
        );
    }

    #[test]
    fn outcome_facets_follow_verdict() {
        let p = Percentiles {
            p50: BTreeMap::from([("rtt_ms".to_string(), 20.0)]),
            p95: BTreeMap::from([("rtt_ms".to_string(), 90.0)]),
            p5: BTreeMap::new(),
        };
        let base = BaseProfile::default();
        let ready = base.outcome_facets(CardVerdict::Ready, &p);
        assert_eq!(ready[0].name, "rtt_ms_p50");
        assert_eq!(ready[0].unit, "ms");
        let not_ready = base.outcome_facets(CardVerdict::NotReady, &p);
        assert_eq!(not_ready[0].name, "rtt_ms_p95");
        assert_eq!(not_ready[0].value, 90.0);
    }

    #[test]
    fn register_replaces_existing() {
        let mut reg = ProfileRegistry::with_builtins();
        reg.register(Box::new(Wifi78InstallAccept {
            rtt_p95_max_ms: 40.0,
            loss_p95_max_pct: 1.0,
        }));
        let reasons = reg.get("WIFI78_INSTALL_ACCEPT").check(&p95(&[("rtt_ms", 50.0)]));
        assert_eq!(reasons, vec!["P95_RTT_TOO_HIGH"]);
    }
}
