//! Recognition engine: one recognition result per cycle.
//!
//! Runs detection on the latest sample, the opacity check on the most recent
//! change event, and classification on both, then feeds the outcome to the
//! episode manager. The episode manager's state is the only thing mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{Classification, Verdict, VerdictClassifier};
use crate::detector::{is_bad_window, BadnessFlag, DetectorThresholds, IncidentDetector};
use crate::episode::{Episode, EpisodeClosePolicy, EpisodeId, EpisodeManager};
use crate::error::{ObservationError, ObservationResult};
use crate::events::ChangeEventCard;
use crate::observability::{ObservabilityChecker, ObservabilityResult};
use crate::types::MetricSample;
use crate::windowing::{WindowKind, WindowPolicy, WindowRef};

/// Externally visible result of one recognition cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecognition {
    /// Open episode after this cycle. `None` on a good window with nothing open.
    pub episode_id: Option<EpisodeId>,
    pub episode_start: Option<DateTime<Utc>>,
    /// Long window of the latest sample.
    pub worst_window_ref: WindowRef,
    pub primary_verdict: Verdict,
    pub confidence: f64,
    pub flags: Vec<BadnessFlag>,
    pub bad_window: bool,
    /// Most recent evidence references, oldest first.
    pub evidence_refs: Vec<String>,
    pub observability: ObservabilityResult,
    /// Timestamp of the sample this cycle was computed from.
    pub sample_ts: DateTime<Utc>,
}

/// Composite evidence reference: `"{window_ref}:{flags|no_flags}"`.
pub fn evidence_ref(window_ref: &WindowRef, flags: &[BadnessFlag]) -> String {
    if flags.is_empty() {
        format!("{}:no_flags", window_ref)
    } else {
        let joined: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
        format!("{}:{}", window_ref, joined.join(","))
    }
}

struct CycleOutcome {
    flags: Vec<BadnessFlag>,
    bad: bool,
    observability: ObservabilityResult,
    classification: Classification,
    worst_window_ref: WindowRef,
    evidence_ref: String,
    sample_ts: DateTime<Utc>,
}

/// Orchestrates detector, opacity checker, classifier and episode manager.
pub struct RecognitionEngine {
    windows: WindowPolicy,
    detector: IncidentDetector,
    checker: ObservabilityChecker,
    classifier: VerdictClassifier,
    episodes: EpisodeManager,
}

impl RecognitionEngine {
    pub fn new(
        windows: WindowPolicy,
        thresholds: &DetectorThresholds,
        close_policy: EpisodeClosePolicy,
    ) -> Self {
        Self::with_detector(windows, IncidentDetector::new(thresholds), close_policy)
    }

    pub fn with_detector(
        windows: WindowPolicy,
        detector: IncidentDetector,
        close_policy: EpisodeClosePolicy,
    ) -> Self {
        Self {
            windows,
            detector,
            checker: ObservabilityChecker::new(),
            classifier: VerdictClassifier::new(),
            episodes: EpisodeManager::new(close_policy),
        }
    }

    /// Run one recognition cycle.
    ///
    /// Fails only when no sample has ever been collected.
    pub fn recognize(
        &mut self,
        latest: Option<&MetricSample>,
        latest_event: Option<&ChangeEventCard>,
    ) -> ObservationResult<EpisodeRecognition> {
        let outcome = self.evaluate(latest, latest_event)?;
        let episode = self
            .episodes
            .observe(
                outcome.sample_ts,
                outcome.bad,
                outcome.worst_window_ref.clone(),
                outcome.evidence_ref.clone(),
            )
            .cloned();
        Ok(Self::assemble(outcome, episode.as_ref()))
    }

    /// Run one cycle and make sure an episode is open afterwards.
    ///
    /// The on-demand freeze path uses this so every exported bundle is keyed
    /// by an episode, even when the current window is good.
    pub fn recognize_pinned(
        &mut self,
        latest: Option<&MetricSample>,
        latest_event: Option<&ChangeEventCard>,
    ) -> ObservationResult<EpisodeRecognition> {
        let outcome = self.evaluate(latest, latest_event)?;
        let episode = self
            .episodes
            .pin(
                outcome.sample_ts,
                outcome.worst_window_ref.clone(),
                outcome.evidence_ref.clone(),
            )
            .clone();
        Ok(Self::assemble(outcome, Some(&episode)))
    }

    pub fn current_episode(&self) -> Option<&Episode> {
        self.episodes.current()
    }

    pub fn clear_episode(&mut self) -> Option<Episode> {
        self.episodes.clear()
    }

    fn evaluate(
        &self,
        latest: Option<&MetricSample>,
        latest_event: Option<&ChangeEventCard>,
    ) -> ObservationResult<CycleOutcome> {
        let sample = latest.ok_or(ObservationError::NoSamplesCollected)?;

        let flags = self.detector.detect(sample);
        let bad = is_bad_window(&flags);
        let observability = self.checker.check(latest_event);
        let classification = self.classifier.classify(&flags, observability.opaque_risk);
        let worst_window_ref = self.windows.window_ref(sample.ts, WindowKind::Long);
        let evidence_ref = evidence_ref(&sample.window_ref, &flags);

        debug!(
            window = %sample.window_ref,
            flags = flags.len(),
            bad,
            verdict = %classification.verdict,
            opaque = observability.opaque_risk,
            "Recognition cycle evaluated"
        );

        Ok(CycleOutcome {
            flags,
            bad,
            observability,
            classification,
            worst_window_ref,
            evidence_ref,
            sample_ts: sample.ts,
        })
    }

    fn assemble(outcome: CycleOutcome, episode: Option<&Episode>) -> EpisodeRecognition {
        let evidence_refs = match episode {
            Some(ep) => ep.recent_evidence(),
            None => vec![outcome.evidence_ref],
        };
        EpisodeRecognition {
            episode_id: episode.map(|ep| ep.id.clone()),
            episode_start: episode.map(|ep| ep.start_ts),
            worst_window_ref: outcome.worst_window_ref,
            primary_verdict: outcome.classification.verdict,
            confidence: outcome.classification.confidence,
            flags: outcome.flags,
            bad_window: outcome.bad,
            evidence_refs,
            observability: outcome.observability,
            sample_ts: outcome.sample_ts,
        }
    }
}

impl Default for RecognitionEngine {
    fn default() -> Self {
        Self::new(
            WindowPolicy::default(),
            &DetectorThresholds::default(),
            EpisodeClosePolicy::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeEventLogger, ChangeEventType, ObservedChange};
    use crate::observability::MissingRef;
    use crate::types::VersionRefs;
    use chrono::TimeZone;

    fn sample_at(secs: i64) -> MetricSample {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        MetricSample::new(ts, WindowPolicy::default().window_ref(ts, WindowKind::Short))
    }

    fn congested(secs: i64) -> MetricSample {
        let mut s = sample_at(secs);
        s.airtime_busy_pct = Some(85.0);
        s.retry_pct = Some(22.0);
        s
    }

    fn explained_event() -> ChangeEventCard {
        ChangeEventLogger::new(WindowPolicy::default(), VersionRefs::new("7.1", "d", "a")).card(
            ObservedChange::new(ChangeEventType::WifiChannelChange, "radio5g")
                .with_origin("controller")
                .with_change_ref("CHG-9"),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn zero_samples_is_fatal() {
        let mut engine = RecognitionEngine::default();
        let err = engine.recognize(None, None).unwrap_err();
        assert!(matches!(err, ObservationError::NoSamplesCollected));
    }

    #[test]
    fn evidence_ref_format() {
        let w = WindowRef("Ws:1700000000".into());
        assert_eq!(evidence_ref(&w, &[]), "Ws:1700000000:no_flags");
        assert_eq!(
            evidence_ref(&w, &[BadnessFlag::AirtimeHigh, BadnessFlag::RetryHigh]),
            "Ws:1700000000:AIRTIME_HIGH,RETRY_HIGH"
        );
    }

    #[test]
    fn good_window_without_event_is_opaque_but_opens_nothing() {
        let mut engine = RecognitionEngine::default();
        let r = engine.recognize(Some(&sample_at(0)), None).unwrap();
        assert!(r.episode_id.is_none());
        assert!(!r.bad_window);
        assert_eq!(r.primary_verdict, Verdict::OpaqueRisk);
        assert_eq!(
            r.observability.missing_refs,
            vec![MissingRef::NoChangeEventDetected]
        );
        assert_eq!(r.evidence_refs, vec!["Ws:1700000000:no_flags".to_string()]);
    }

    #[test]
    fn explained_congestion_opens_episode() {
        let mut engine = RecognitionEngine::default();
        let event = explained_event();
        let r = engine.recognize(Some(&congested(5)), Some(&event)).unwrap();
        assert!(r.bad_window);
        assert!(r.episode_id.is_some());
        assert_eq!(r.primary_verdict, Verdict::WifiCongestion);
        assert!((r.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(r.worst_window_ref.as_str(), "Wl:1699999980");
    }

    #[test]
    fn consecutive_cycles_share_one_episode() {
        let mut engine = RecognitionEngine::default();
        let event = explained_event();
        let first = engine.recognize(Some(&congested(0)), Some(&event)).unwrap();
        let second = engine.recognize(Some(&sample_at(10)), Some(&event)).unwrap();
        let third = engine.recognize(Some(&congested(20)), Some(&event)).unwrap();
        assert_eq!(first.episode_id, second.episode_id);
        assert_eq!(second.episode_id, third.episode_id);
        assert_eq!(third.evidence_refs.len(), 3);
        assert_eq!(first.episode_start, third.episode_start);
    }

    #[test]
    fn pinned_recognition_always_has_an_episode() {
        let mut engine = RecognitionEngine::default();
        let r = engine.recognize_pinned(Some(&sample_at(0)), None).unwrap();
        assert!(r.episode_id.is_some());
        assert_eq!(engine.current_episode().map(|e| e.id.clone()), r.episode_id);
    }

    #[test]
    fn clear_then_retrigger_changes_identity() {
        let mut engine = RecognitionEngine::default();
        let a = engine.recognize(Some(&congested(0)), None).unwrap();
        engine.clear_episode();
        let b = engine.recognize(Some(&congested(10)), None).unwrap();
        assert_ne!(a.episode_id, b.episode_id);
    }
}
