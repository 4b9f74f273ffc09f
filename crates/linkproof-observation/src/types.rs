//! Core observation record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::windowing::WindowRef;

/// Marker used by adapters for a version string they could not read.
pub const UNKNOWN_VERSION: &str = "unknown";

/// DNS lookup outcome reported by the collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsStatus {
    Ok,
    Fail,
}

/// One timestamped link observation.
///
/// Every measurement is optional. `None` means "not measured" and is never
/// conflated with zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub ts: DateTime<Utc>,
    pub window_ref: WindowRef,

    pub latency_p95_ms: Option<f64>,
    pub loss_pct: Option<f64>,
    pub jitter_ms: Option<f64>,

    pub retry_pct: Option<f64>,
    pub airtime_busy_pct: Option<f64>,
    pub roam_count: Option<u32>,
    /// Mesh backhaul flaps per minute.
    pub mesh_flap_count: Option<f64>,

    pub wan_sinr_db: Option<f64>,
    pub wan_rsrp_dbm: Option<f64>,
    pub wan_reattach_count: Option<u32>,

    pub in_rate_bps: Option<f64>,
    pub out_rate_bps: Option<f64>,
    pub cpu_load_pct: Option<f64>,
    pub mem_load_pct: Option<f64>,

    pub signal_strength_pct: Option<f64>,
    pub phy_rate_mbps: Option<f64>,
    pub phy_rx_rate_mbps: Option<f64>,
    pub channel: Option<u32>,
    pub bssid: Option<String>,
    pub radio_type: Option<String>,
    pub band: Option<String>,

    pub dns_status: Option<DnsStatus>,
}

impl MetricSample {
    /// A sample with no measurements.
    pub fn new(ts: DateTime<Utc>, window_ref: WindowRef) -> Self {
        Self {
            ts,
            window_ref,
            latency_p95_ms: None,
            loss_pct: None,
            jitter_ms: None,
            retry_pct: None,
            airtime_busy_pct: None,
            roam_count: None,
            mesh_flap_count: None,
            wan_sinr_db: None,
            wan_rsrp_dbm: None,
            wan_reattach_count: None,
            in_rate_bps: None,
            out_rate_bps: None,
            cpu_load_pct: None,
            mem_load_pct: None,
            signal_strength_pct: None,
            phy_rate_mbps: None,
            phy_rx_rate_mbps: None,
            channel: None,
            bssid: None,
            radio_type: None,
            band: None,
            dns_status: None,
        }
    }
}

/// Firmware/driver/agent versions in effect when a change was observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRefs {
    pub fw: Option<String>,
    pub driver: Option<String>,
    pub agent: Option<String>,
}

impl VersionRefs {
    pub fn new(
        fw: impl Into<String>,
        driver: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            fw: Some(fw.into()),
            driver: Some(driver.into()),
            agent: Some(agent.into()),
        }
    }

    /// True when neither firmware nor driver version is known.
    ///
    /// The agent version is the collector's own and says nothing about the
    /// changed component, so it does not count.
    pub fn is_unknown(&self) -> bool {
        !is_known(self.fw.as_deref()) && !is_known(self.driver.as_deref())
    }
}

impl fmt::Display for VersionRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fw={} driver={} agent={}",
            self.fw.as_deref().unwrap_or(UNKNOWN_VERSION),
            self.driver.as_deref().unwrap_or(UNKNOWN_VERSION),
            self.agent.as_deref().unwrap_or(UNKNOWN_VERSION),
        )
    }
}

/// True when a reference value is present and not the unknown marker.
pub(crate) fn is_known(value: Option<&str>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim();
            !v.is_empty() && !v.eq_ignore_ascii_case(UNKNOWN_VERSION)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windowing::{WindowKind, WindowPolicy};

    #[test]
    fn absent_fields_are_distinct_from_zero() {
        let ts = Utc::now();
        let wref = WindowPolicy::default().window_ref(ts, WindowKind::Short);
        let mut s = MetricSample::new(ts, wref);
        assert!(s.loss_pct.is_none());
        s.loss_pct = Some(0.0);
        assert_eq!(s.loss_pct, Some(0.0));
    }

    #[test]
    fn sample_serde_roundtrip_keeps_absence() {
        let ts = Utc::now();
        let mut s = MetricSample::new(ts, WindowRef("Ws:0".into()));
        s.retry_pct = Some(12.5);
        s.dns_status = Some(DnsStatus::Fail);
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"FAIL\""));
        let restored: MetricSample = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, s);
        assert!(restored.latency_p95_ms.is_none());
    }

    #[test]
    fn missing_optional_fields_deserialize_as_none() {
        let json = r#"{"ts":"2026-01-01T00:00:00Z","window_ref":"Ws:0","loss_pct":1.5}"#;
        let s: MetricSample = serde_json::from_str(json).unwrap();
        assert_eq!(s.loss_pct, Some(1.5));
        assert!(s.wan_sinr_db.is_none());
    }

    #[test]
    fn version_refs_unknown_detection() {
        assert!(VersionRefs::default().is_unknown());
        assert!(VersionRefs::new("unknown", "UNKNOWN", "1.0").is_unknown());
        assert!(!VersionRefs::new("7.1.2", "unknown", "1.0").is_unknown());
        assert!(!VersionRefs::new("unknown", "iwlwifi-83", "1.0").is_unknown());
    }

    #[test]
    fn version_refs_display() {
        let v = VersionRefs {
            fw: Some("7.1".into()),
            driver: None,
            agent: Some("0.1.3".into()),
        };
        assert_eq!(v.to_string(), "fw=7.1 driver=unknown agent=0.1.3");
    }
}
