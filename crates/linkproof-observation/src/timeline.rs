//! Timeline builder: flattens buffered history into chronological lists.
//!
//! Only core metric values, event metadata and snapshot digests make it into
//! the timeline. No raw payload is carried.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ChangeEventCard, ChangeEventType};
use crate::history::HistorySnapshot;
use crate::snapshot::{PreChangeSnapshot, SnapshotRefId, SnapshotType};
use crate::types::{DnsStatus, MetricSample};
use crate::windowing::WindowRef;

/// Core metric values of one sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub t: DateTime<Utc>,
    pub window_ref: WindowRef,
    pub latency_p95_ms: Option<f64>,
    pub loss_pct: Option<f64>,
    pub retry_pct: Option<f64>,
    pub airtime_busy_pct: Option<f64>,
    pub mesh_flap_count: Option<f64>,
    pub wan_sinr_db: Option<f64>,
    #[serde(default)]
    pub signal_strength_pct: Option<f64>,
    #[serde(default)]
    pub phy_rate_mbps: Option<f64>,
    #[serde(default)]
    pub dns_status: Option<DnsStatus>,
}

impl From<&MetricSample> for MetricPoint {
    fn from(s: &MetricSample) -> Self {
        Self {
            t: s.ts,
            window_ref: s.window_ref.clone(),
            latency_p95_ms: s.latency_p95_ms,
            loss_pct: s.loss_pct,
            retry_pct: s.retry_pct,
            airtime_busy_pct: s.airtime_busy_pct,
            mesh_flap_count: s.mesh_flap_count,
            wan_sinr_db: s.wan_sinr_db,
            signal_strength_pct: s.signal_strength_pct,
            phy_rate_mbps: s.phy_rate_mbps,
            dns_status: s.dns_status,
        }
    }
}

impl MetricPoint {
    /// Rebuild a sample carrying only the core metrics.
    pub fn to_sample(&self) -> MetricSample {
        let mut s = MetricSample::new(self.t, self.window_ref.clone());
        s.latency_p95_ms = self.latency_p95_ms;
        s.loss_pct = self.loss_pct;
        s.retry_pct = self.retry_pct;
        s.airtime_busy_pct = self.airtime_busy_pct;
        s.mesh_flap_count = self.mesh_flap_count;
        s.wan_sinr_db = self.wan_sinr_db;
        s.signal_strength_pct = self.signal_strength_pct;
        s.phy_rate_mbps = self.phy_rate_mbps;
        s.dns_status = self.dns_status;
        s
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventPoint {
    pub t: DateTime<Utc>,
    pub event_type: ChangeEventType,
    pub origin_hint: Option<String>,
    pub target_scope: String,
    pub change_ref: Option<String>,
    pub window_ref: WindowRef,
}

impl From<&ChangeEventCard> for ChangeEventPoint {
    fn from(e: &ChangeEventCard) -> Self {
        Self {
            t: e.event_time,
            event_type: e.event_type.clone(),
            origin_hint: e.origin_hint.clone(),
            target_scope: e.target_scope.clone(),
            change_ref: e.change_ref.clone(),
            window_ref: e.window_ref.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    pub t: DateTime<Utc>,
    pub snapshot_ref_id: SnapshotRefId,
    pub scope: String,
    pub snapshot_type: SnapshotType,
    pub digest: String,
    pub readable_fields: BTreeMap<String, String>,
}

impl From<&PreChangeSnapshot> for SnapshotPoint {
    fn from(s: &PreChangeSnapshot) -> Self {
        Self {
            t: s.capture_time,
            snapshot_ref_id: s.snapshot_ref_id.clone(),
            scope: s.scope.clone(),
            snapshot_type: s.snapshot_type,
            digest: s.digest.clone(),
            readable_fields: s.readable_fields.clone(),
        }
    }
}

/// Flattened evidence timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub metrics_points: Vec<MetricPoint>,
    pub change_events: Vec<ChangeEventPoint>,
    pub pre_change_snapshots: Vec<SnapshotPoint>,
}

impl Timeline {
    /// Build a chronological timeline from a history snapshot.
    pub fn build(history: &HistorySnapshot) -> Self {
        let mut metrics_points: Vec<MetricPoint> =
            history.metrics.iter().map(MetricPoint::from).collect();
        let mut change_events: Vec<ChangeEventPoint> =
            history.events.iter().map(ChangeEventPoint::from).collect();
        let mut pre_change_snapshots: Vec<SnapshotPoint> =
            history.snapshots.iter().map(SnapshotPoint::from).collect();

        // stable: equal timestamps keep insertion order
        metrics_points.sort_by_key(|p| p.t);
        change_events.sort_by_key(|p| p.t);
        pre_change_snapshots.sort_by_key(|p| p.t);

        Self {
            metrics_points,
            change_events,
            pre_change_snapshots,
        }
    }

    /// Samples reconstructed from the metric points.
    pub fn samples(&self) -> Vec<MetricSample> {
        self.metrics_points.iter().map(MetricPoint::to_sample).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics_points.is_empty()
            && self.change_events.is_empty()
            && self.pre_change_snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeEventLogger, ObservedChange};
    use crate::snapshot::SnapshotManager;
    use crate::types::VersionRefs;
    use crate::windowing::{WindowKind, WindowPolicy};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(secs: i64, latency: f64) -> MetricSample {
        let ts = at(secs);
        let mut s = MetricSample::new(ts, WindowPolicy::default().window_ref(ts, WindowKind::Short));
        s.latency_p95_ms = Some(latency);
        s.jitter_ms = Some(3.0);
        s.bssid = Some("aa:bb:cc:dd:ee:ff".into());
        s
    }

    #[test]
    fn build_sorts_chronologically_and_drops_non_core_fields() {
        let history = HistorySnapshot {
            metrics: vec![sample(20, 30.0), sample(0, 10.0), sample(10, 20.0)],
            events: vec![],
            snapshots: vec![],
        };
        let tl = Timeline::build(&history);
        let ts: Vec<_> = tl.metrics_points.iter().map(|p| p.t).collect();
        assert_eq!(ts, vec![at(0), at(10), at(20)]);
        let json = serde_json::to_string(&tl).unwrap();
        assert!(!json.contains("aa:bb:cc"));
        assert!(!json.contains("jitter"));
    }

    #[test]
    fn events_and_snapshots_are_flattened() {
        let logger = ChangeEventLogger::new(WindowPolicy::default(), VersionRefs::default());
        let event = logger.card(
            ObservedChange::new(ChangeEventType::FirmwareUpgrade, "system").with_change_ref("FW-1"),
            at(5),
        );
        let mut fields = BTreeMap::new();
        fields.insert("fw".to_string(), "7.1".to_string());
        let snap = SnapshotManager::new().capture("system", fields, SnapshotType::PreIncident, at(4));

        let tl = Timeline::build(&HistorySnapshot {
            metrics: vec![],
            events: vec![event],
            snapshots: vec![snap.clone()],
        });
        assert_eq!(tl.change_events.len(), 1);
        assert_eq!(tl.change_events[0].change_ref.as_deref(), Some("FW-1"));
        assert_eq!(tl.pre_change_snapshots[0].digest, snap.digest);
        assert_eq!(tl.pre_change_snapshots[0].snapshot_type, SnapshotType::PreIncident);
    }

    #[test]
    fn point_back_to_sample_keeps_core_metrics() {
        let mut s = sample(0, 42.0);
        s.dns_status = Some(DnsStatus::Ok);
        s.signal_strength_pct = Some(70.0);
        let back = MetricPoint::from(&s).to_sample();
        assert_eq!(back.latency_p95_ms, Some(42.0));
        assert_eq!(back.signal_strength_pct, Some(70.0));
        assert_eq!(back.dns_status, Some(DnsStatus::Ok));
        assert!(back.jitter_ms.is_none());
    }

    #[test]
    fn empty_history_gives_empty_timeline() {
        assert!(Timeline::build(&HistorySnapshot::default()).is_empty());
    }
}
