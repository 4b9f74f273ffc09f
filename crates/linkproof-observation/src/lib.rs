//! # linkproof-observation
//!
//! Evidence pipeline for a customer-premises link (Wi-Fi, FWA, cable).
//!
//! Periodic samples, change events and pre-change snapshots are buffered in
//! bounded history stores. On demand, the recognition engine flags bad
//! windows, classifies them, checks whether the latest change is explainable
//! and tracks a single open episode. The freeze path turns the buffered
//! history into a content-hashed evidence bundle.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────┐  tick   ┌────────────────┐
//!   │ DomainAdapter │────────▶│ HistoryStores  │  samples / events / snapshots
//!   └───────────────┘         └───────┬────────┘
//!                                     │ last sample, last event
//!                                     ▼
//!                         ┌────────────────────────┐
//!                         │ RecognitionEngine      │
//!                         │  detector → classifier │
//!                         │  observability check   │
//!                         │  episode manager       │
//!                         └───────────┬────────────┘
//!                                     │ freeze
//!                                     ▼
//!                  ┌─────────────────────────────────────┐
//!                  │ Timeline → EvidenceBundle → Exporter │
//!                  └─────────────────────────────────────┘
//! ```
//!
//! Offline consumers read bundles back with [`load_bundle`] and run the
//! [`FingerprintAnalyzer`] or the [`ReadinessScorer`] over them.
//!
//! ## Invariants
//!
//! - A window is bad only when two or more flags fire.
//! - At most one episode is open; it is updated in place, never forked.
//! - A missing change event is always reported as opaque.
//! - Recognition with no sample ever collected is an error, nothing else is.

#![deny(unsafe_code)]

pub mod adapter;
pub mod bundle;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod episode;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod history;
pub mod observability;
pub mod readiness;
pub mod recognition;
pub mod runtime;
pub mod snapshot;
pub mod timeline;
pub mod types;
pub mod windowing;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use adapter::{CollectedChanges, DomainAdapter, TickContext};
pub use bundle::{
    load_bundle, BundleExporter, EvidenceBundle, InMemoryExporter, JsonDirExporter, BUNDLE_SPEC,
};
pub use classifier::{Classification, Verdict, VerdictClassifier};
pub use config::RuntimeConfig;
pub use detector::{
    is_bad_window, BadnessFlag, BadnessSignal, DetectorThresholds, IncidentDetector,
    BAD_WINDOW_MIN_FLAGS,
};
pub use episode::{
    CloseReason, Episode, EpisodeClosePolicy, EpisodeId, EpisodeManager, EVIDENCE_REFS_REPORTED,
};
pub use error::{ObservationError, ObservationResult};
pub use events::{ChangeEventCard, ChangeEventLogger, ChangeEventType, ObservedChange};
pub use fingerprint::{Fingerprint, FingerprintAnalyzer, PatternLabel, SliceSummary, SplitMethod};
pub use history::{BoundedHistory, HistoryCapacity, HistorySnapshot, HistoryStores};
pub use observability::{MissingRef, ObservabilityChecker, ObservabilityResult, ObservabilityStatus};
pub use readiness::{
    ClosureReadiness, DominantFactor, ReadinessResult, ReadinessScorer, ReadinessThresholds,
    ReadinessVerdict,
};
pub use recognition::{evidence_ref, EpisodeRecognition, RecognitionEngine};
pub use runtime::{EvidenceRuntime, FreezeResult, SamplingHandle, TickReport};
pub use snapshot::{PreChangeSnapshot, SnapshotManager, SnapshotRefId, SnapshotType};
pub use timeline::{ChangeEventPoint, MetricPoint, SnapshotPoint, Timeline};
pub use types::{DnsStatus, MetricSample, VersionRefs};
pub use windowing::{WindowKind, WindowPolicy, WindowRef};
