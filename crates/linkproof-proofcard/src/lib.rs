//! # linkproof-proofcard
//!
//! Profile-scoped ProofCards over a window of raw metric records.
//!
//! A v1.3 card carries nearest-rank p50/p95/p5 facets, a verdict from the
//! selected profile and a non-empty reason list. The v1.4 overlay runs three
//! metadata-only hooks over an [`AttemptCtx`]:
//!
//! 1. [`privacy_check`]: are the governance references present and current?
//! 2. [`byuse_qualify`]: does the declared usage context raise the bar?
//! 3. [`egress_gate`]: may the privacy-sensitive section leave the device?
//!
//! [`compute_admission`] folds the card verdict and the first two hook results
//! into an evidence grade and an admission decision. None of the hooks ever
//! look at sample payloads.
//!
//! ```text
//!   records ──▶ ProofCardGenerator (v1.3) ──▶ ProofCardGeneratorV14
//!                                               │ privacy_check
//!                                               │ byuse_qualify
//!                                               │ compute_admission
//!                                               ▼
//!                                         ProofCardV14 ──apply_egress_gate──▶ receipt
//! ```

#![deny(unsafe_code)]

pub mod admission;
pub mod attempt;
pub mod card;
pub mod card_v14;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod privacy;
pub mod profile;
pub mod quantile;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use admission::{compute_admission, Admission, AdmissionEffect, AdmissionVerdict, EvidenceGrade};
pub use attempt::{AttemptCtx, EgressRequest, GovernanceRefs, DEFAULT_GATE_REF, GOVERNANCE_REF_NAMES};
pub use card::{
    CardVerdict, Facet, ProofCard, ProofCardGenerator, REASON_CHECKS_PASSED,
    REASON_INSUFFICIENT_SAMPLES,
};
pub use card_v14::{MinSection, PrivSection, ProofCardGeneratorV14, ProofCardV14};
pub use error::{ProofCardError, ProofCardResult};
pub use hooks::{
    byuse_qualify, egress_gate, enforce_admission, privacy_check, ByuseResult, EgressMode,
    EgressResult, PrivacyResult, PrivacyVerdict, RC_EGRESS_ADMISSION_OVERRIDE,
};
pub use metrics::{extract_vectors, records_from, MetricAlias, MetricRecord, METRIC_ALIASES};
pub use privacy::{
    ConfigSource, EgressGateConfig, FailAction, PrivExportRule, PrivacyConfig, ProfilePolicy,
    UsagePolicy,
};
pub use profile::{
    BaseProfile, CableUpstreamIntermittent, FwaCongestionSuspect, Percentiles, Profile,
    ProfileRegistry, Wifi78InstallAccept,
};
pub use quantile::{nearest_rank, p50_p95_p5};
