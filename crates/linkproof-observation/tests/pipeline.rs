//! End-to-end: sampling runtime → recognition → export → load → offline analysis.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use linkproof_observation::{
    load_bundle, ChangeEventLogger, ChangeEventType, CollectedChanges, DomainAdapter,
    EvidenceRuntime, FingerprintAnalyzer, JsonDirExporter, MissingRef, ObservationResult,
    ObservedChange, MetricSample, ReadinessScorer, ReadinessVerdict, RuntimeConfig,
    SnapshotManager, SnapshotType, SplitMethod, TickContext, Verdict, VersionRefs, WindowPolicy,
};

/// Quiet link with a congestion burst on ticks 8..=11 and an unexplained
/// channel change just before it.
struct BurstAdapter {
    logger: ChangeEventLogger,
    snapshots: SnapshotManager,
}

impl BurstAdapter {
    fn new() -> Self {
        Self {
            logger: ChangeEventLogger::new(
                WindowPolicy::default(),
                VersionRefs::new("7.1.2", "ath12k-3", "lp-agent-1"),
            ),
            snapshots: SnapshotManager::new(),
        }
    }

    fn in_burst(tick: u64) -> bool {
        (8..=11).contains(&tick)
    }
}

impl DomainAdapter for BurstAdapter {
    fn collect_metric_sample(&mut self, ctx: &TickContext) -> ObservationResult<MetricSample> {
        let mut s = MetricSample::new(ctx.at, ctx.window_ref.clone());
        s.loss_pct = Some(0.1);
        s.jitter_ms = Some(2.0);
        s.signal_strength_pct = Some(70.0);
        s.phy_rate_mbps = Some(860.0);
        if Self::in_burst(ctx.tick) {
            s.latency_p95_ms = Some(140.0);
            s.retry_pct = Some(30.0);
            s.airtime_busy_pct = Some(90.0);
        } else {
            s.latency_p95_ms = Some(20.0);
            s.retry_pct = Some(4.0);
            s.airtime_busy_pct = Some(30.0);
        }
        Ok(s)
    }

    fn collect_change_events_and_snapshots(
        &mut self,
        ctx: &TickContext,
    ) -> ObservationResult<CollectedChanges> {
        let mut changes = CollectedChanges::default();
        if ctx.tick == 0 {
            let mut fields = BTreeMap::new();
            fields.insert("channel_5g".to_string(), "36".to_string());
            fields.insert("width_5g".to_string(), "160".to_string());
            changes.snapshots.push(self.snapshots.capture(
                "radio5g",
                fields,
                SnapshotType::PostInstall,
                ctx.at,
            ));
        }
        if ctx.tick == 7 {
            changes.events.push(self.logger.card(
                ObservedChange::new(ChangeEventType::WifiChannelChange, "radio5g")
                    .with_trigger("auto_channel"),
                ctx.at,
            ));
        }
        Ok(changes)
    }

    fn name(&self) -> &str {
        "burst"
    }
}

fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("linkproof-pipeline-{}", uuid::Uuid::new_v4()))
}

fn runtime(dir: &PathBuf) -> EvidenceRuntime {
    EvidenceRuntime::starting_at(
        RuntimeConfig::accelerated(),
        Box::new(BurstAdapter::new()),
        Arc::new(JsonDirExporter::new(dir)),
        start(),
    )
    .unwrap()
}

#[test]
fn burst_is_recognized_as_opaque_episode() {
    let dir = temp_dir();
    let rt = runtime(&dir);

    rt.run_ticks(9).unwrap();
    let r = rt.generate_recognition().unwrap();

    assert!(r.bad_window);
    assert!(r.episode_id.is_some());
    assert_eq!(r.primary_verdict, Verdict::OpaqueRisk);
    assert!(r.observability.opaque_risk);
    assert!(r.observability.missing_refs.contains(&MissingRef::OriginHint));
    assert!(r.observability.missing_refs.contains(&MissingRef::ChangeRef));
    assert!(r.evidence_refs[0].ends_with("AIRTIME_HIGH,RETRY_HIGH,LAT_SPIKE"));
}

#[test]
fn freeze_then_load_then_fingerprint() {
    let dir = temp_dir();
    let rt = runtime(&dir);
    rt.run_ticks(20).unwrap();

    let frozen = rt.freeze_export().unwrap();
    let loaded = load_bundle(&frozen.location).unwrap();
    assert_eq!(loaded, frozen.bundle);
    assert_eq!(loaded.timeline.metrics_points.len(), 20);
    assert_eq!(loaded.timeline.change_events.len(), 1);
    assert_eq!(loaded.timeline.pre_change_snapshots.len(), 1);

    let fp = FingerprintAnalyzer::new().analyze(&loaded);
    assert_eq!(fp.episode_id, Some(loaded.episode_id.clone()));
    assert_eq!(fp.point_count, 20);
    assert!(matches!(fp.split, SplitMethod::PeakLatency { peak_index: 8 }));
    assert_eq!(fp.before.points + fp.during.points + fp.after.points, 20);
    assert!(fp.during.means["latency_p95_ms"] > fp.before.means["latency_p95_ms"]);
    assert!(fp.confidence > 0.0 && fp.confidence <= 0.9);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn readiness_from_exported_timeline() {
    let dir = temp_dir();
    let rt = runtime(&dir);
    rt.run_ticks(30).unwrap();

    let frozen = rt.freeze_export().unwrap();
    let loaded = load_bundle(&frozen.location).unwrap();

    // Window reaches back to the last burst sample; the quiet tail dominates.
    let offline = ReadinessScorer::default().score(&loaded.timeline.samples());
    assert_eq!(offline.verdict, ReadinessVerdict::Pass);
    assert_eq!(offline, rt.readiness().unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn tampered_file_is_rejected() {
    let dir = temp_dir();
    let rt = runtime(&dir);
    rt.run_ticks(6).unwrap();
    let frozen = rt.freeze_export().unwrap();

    let text = std::fs::read_to_string(&frozen.location).unwrap();
    let tampered = text.replacen("\"primary_verdict\": \"OPAQUE_RISK\"", "\"primary_verdict\": \"UNKNOWN\"", 1);
    assert_ne!(text, tampered);
    std::fs::write(&frozen.location, tampered).unwrap();

    assert!(load_bundle(&frozen.location).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}
