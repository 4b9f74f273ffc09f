//! Evidence bundles: frozen, exportable evidence documents.
//!
//! A bundle combines the recognition summary, the observability status and
//! the flattened timeline. It is content-addressed: `content_hash` covers
//! everything but itself, so tampering after export is detectable.
//!
//! Export is the only place the pipeline writes durable evidence. Writes are
//! atomic (write to `.tmp`, then rename). Loading is typed and fails closed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::Verdict;
use crate::episode::EpisodeId;
use crate::error::{ObservationError, ObservationResult};
use crate::observability::ObservabilityResult;
use crate::recognition::EpisodeRecognition;
use crate::timeline::Timeline;
use crate::windowing::WindowRef;

/// Format tag carried by every bundle.
pub const BUNDLE_SPEC: &str = "linkproof.evidence_bundle.v1";

/// Frozen evidence for one episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub spec: String,
    pub episode_id: EpisodeId,
    pub episode_start: DateTime<Utc>,
    pub worst_window_ref: WindowRef,
    pub primary_verdict: Verdict,
    pub confidence: f64,
    pub evidence_refs: Vec<String>,
    pub observability: ObservabilityResult,
    pub timeline: Timeline,
    pub exported_at: DateTime<Utc>,
    /// Hex BLAKE3 over all other fields.
    pub content_hash: String,
}

impl EvidenceBundle {
    /// Freeze a recognition result and timeline into a bundle.
    ///
    /// The recognition must be keyed by an episode.
    pub fn freeze(
        recognition: &EpisodeRecognition,
        timeline: Timeline,
        exported_at: DateTime<Utc>,
    ) -> ObservationResult<Self> {
        let (Some(episode_id), Some(episode_start)) =
            (recognition.episode_id.clone(), recognition.episode_start)
        else {
            return Err(ObservationError::BundleShape(
                "recognition is not keyed by an episode".into(),
            ));
        };

        let mut bundle = Self {
            spec: BUNDLE_SPEC.to_string(),
            episode_id,
            episode_start,
            worst_window_ref: recognition.worst_window_ref.clone(),
            primary_verdict: recognition.primary_verdict,
            confidence: recognition.confidence,
            evidence_refs: recognition.evidence_refs.clone(),
            observability: recognition.observability.clone(),
            timeline,
            exported_at,
            content_hash: String::new(),
        };
        bundle.content_hash = bundle.compute_hash()?;
        Ok(bundle)
    }

    fn compute_hash(&self) -> ObservationResult<String> {
        let ser = |e: serde_json::Error| ObservationError::Serialization(e.to_string());
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.spec.as_bytes());
        hasher.update(self.episode_id.0.as_bytes());
        hasher.update(&serde_json::to_vec(&self.episode_start).map_err(ser)?);
        hasher.update(self.worst_window_ref.as_str().as_bytes());
        hasher.update(self.primary_verdict.as_str().as_bytes());
        hasher.update(&self.confidence.to_le_bytes());
        hasher.update(&serde_json::to_vec(&self.evidence_refs).map_err(ser)?);
        hasher.update(&serde_json::to_vec(&self.observability).map_err(ser)?);
        hasher.update(&serde_json::to_vec(&self.timeline).map_err(ser)?);
        hasher.update(&serde_json::to_vec(&self.exported_at).map_err(ser)?);
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Verify the content hash matches the data.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash()
            .map(|h| h == self.content_hash)
            .unwrap_or(false)
    }

    /// Artifact name: `evidence_bundle_{episode_id}_{epoch}.json`.
    pub fn file_name(&self) -> String {
        format!(
            "evidence_bundle_{}_{}.json",
            self.episode_id,
            self.exported_at.timestamp()
        )
    }

    /// Parse a bundle from JSON, rejecting anything that is not a well-formed,
    /// untampered bundle.
    pub fn from_json(json: &str) -> ObservationResult<Self> {
        let bundle: Self = serde_json::from_str(json)
            .map_err(|e| ObservationError::BundleShape(e.to_string()))?;
        if bundle.spec != BUNDLE_SPEC {
            return Err(ObservationError::BundleShape(format!(
                "unsupported bundle spec '{}'",
                bundle.spec
            )));
        }
        if !bundle.verify_hash() {
            return Err(ObservationError::BundleShape(
                "content hash does not match bundle data".into(),
            ));
        }
        Ok(bundle)
    }

    pub fn to_json_pretty(&self) -> ObservationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ObservationError::Serialization(e.to_string()))
    }
}

/// Load a bundle from disk.
pub fn load_bundle(path: impl AsRef<Path>) -> ObservationResult<EvidenceBundle> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    EvidenceBundle::from_json(&contents)
}

// ── Exporters ───────────────────────────────────────────────────────────

/// Destination for frozen bundles.
pub trait BundleExporter: Send + Sync {
    /// Persist the bundle and return its location.
    fn export(&self, bundle: &EvidenceBundle) -> ObservationResult<String>;
}

/// Writes each bundle as a JSON file into a directory.
pub struct JsonDirExporter {
    dir: PathBuf,
}

impl JsonDirExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BundleExporter for JsonDirExporter {
    fn export(&self, bundle: &EvidenceBundle) -> ObservationResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let json = bundle.to_json_pretty()?;

        let path = self.dir.join(bundle.file_name());
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;

        info!(
            episode_id = %bundle.episode_id,
            path = %path.display(),
            points = bundle.timeline.metrics_points.len(),
            "Evidence bundle exported"
        );
        Ok(path.display().to_string())
    }
}

/// Keeps exported bundles in memory (for testing and embedding).
#[derive(Default)]
pub struct InMemoryExporter {
    bundles: Mutex<Vec<EvidenceBundle>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> ObservationResult<Vec<EvidenceBundle>> {
        let bundles = self.bundles.lock().map_err(|_| ObservationError::LockError)?;
        Ok(bundles.clone())
    }
}

impl BundleExporter for InMemoryExporter {
    fn export(&self, bundle: &EvidenceBundle) -> ObservationResult<String> {
        let mut bundles = self.bundles.lock().map_err(|_| ObservationError::LockError)?;
        bundles.push(bundle.clone());
        Ok(format!("memory://{}", bundle.file_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistorySnapshot;
    use crate::recognition::RecognitionEngine;
    use crate::types::MetricSample;
    use crate::windowing::{WindowKind, WindowPolicy};
    use chrono::TimeZone;

    fn samples() -> Vec<MetricSample> {
        (0..8)
            .map(|i| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i * 10, 0).unwrap();
                let mut s = MetricSample::new(ts, WindowPolicy::default().window_ref(ts, WindowKind::Short));
                s.latency_p95_ms = Some(20.0 + i as f64);
                s.loss_pct = Some(0.1);
                s
            })
            .collect()
    }

    fn bundle() -> EvidenceBundle {
        let history = HistorySnapshot {
            metrics: samples(),
            ..Default::default()
        };
        let mut engine = RecognitionEngine::default();
        let r = engine
            .recognize_pinned(history.metrics.last(), None)
            .unwrap();
        EvidenceBundle::freeze(&r, Timeline::build(&history), Utc.timestamp_opt(1_700_000_100, 0).unwrap())
            .unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("linkproof-bundle-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn freeze_requires_an_episode() {
        let history = HistorySnapshot {
            metrics: samples(),
            ..Default::default()
        };
        let mut engine = RecognitionEngine::default();
        let r = engine.recognize(history.metrics.last(), None).unwrap();
        assert!(r.episode_id.is_none());
        let err = EvidenceBundle::freeze(&r, Timeline::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, ObservationError::BundleShape(_)));
    }

    #[test]
    fn frozen_bundle_verifies() {
        let b = bundle();
        assert_eq!(b.spec, BUNDLE_SPEC);
        assert_eq!(b.content_hash.len(), 64);
        assert!(b.verify_hash());
    }

    #[test]
    fn file_name_encodes_episode_and_epoch() {
        let b = bundle();
        assert_eq!(
            b.file_name(),
            format!("evidence_bundle_{}_1700000100.json", b.episode_id)
        );
    }

    #[test]
    fn tampering_is_detected_on_load() {
        let mut b = bundle();
        b.timeline.metrics_points[0].latency_p95_ms = Some(999.0);
        let json = serde_json::to_string(&b).unwrap();
        let err = EvidenceBundle::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("content hash"));
    }

    #[test]
    fn wrong_shape_fails_closed() {
        let err = EvidenceBundle::from_json(r#"{"spec":"linkproof.evidence_bundle.v1"}"#).unwrap_err();
        assert!(matches!(err, ObservationError::BundleShape(_)));

        let mut b = bundle();
        b.spec = "other.v9".into();
        let json = serde_json::to_string(&b).unwrap();
        assert!(EvidenceBundle::from_json(&json).is_err());
    }

    #[test]
    fn dir_export_then_load_roundtrip() {
        let dir = temp_dir();
        let exporter = JsonDirExporter::new(&dir);
        let b = bundle();
        let location = exporter.export(&b).unwrap();
        assert!(location.ends_with(&b.file_name()));
        assert!(!dir.join(b.file_name()).with_extension("tmp").exists());

        let loaded = load_bundle(&location).unwrap();
        assert_eq!(loaded, b);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file_is_persistence_error() {
        let err = load_bundle(temp_dir().join("nope.json")).unwrap_err();
        assert!(matches!(err, ObservationError::Persistence(_)));
    }

    #[test]
    fn in_memory_exporter_keeps_bundles() {
        let exporter = InMemoryExporter::new();
        let b = bundle();
        let loc = exporter.export(&b).unwrap();
        assert!(loc.starts_with("memory://"));
        assert_eq!(exporter.bundles().unwrap().len(), 1);
    }
}
