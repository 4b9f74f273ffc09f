//! ProofCard v1.3: profile-scoped percentile attestation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{extract_vectors, MetricRecord};
use crate::profile::{facets, Percentiles, ProfileRegistry};
use crate::quantile::p50_p95_p5;

pub const REASON_INSUFFICIENT_SAMPLES: &str = "INSUFFICIENT_SAMPLES";
pub const REASON_CHECKS_PASSED: &str = "CHECKS_PASSED";

pub const ENFORCEMENT_PATH_REF: &str = "EP-DEFAULT-01";
pub const AUTHORITY_SCOPE_REF: &str = "SCOPE-CPE-LOCAL";
pub const VALIDITY_HORIZON_REF: &str = "7DAYS";
pub const VALIDITY_VERDICT: &str = "VALID";
pub const BASIS_REF: &str = "BASIS-V1.3";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardVerdict {
    Ready,
    NotReady,
    InsufficientEvidence,
}

impl fmt::Display for CardVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "READY",
            Self::NotReady => "NOT_READY",
            Self::InsufficientEvidence => "INSUFFICIENT_EVIDENCE",
        };
        f.write_str(s)
    }
}

/// Named value with a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl Facet {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// ProofCard v1.3.
///
/// `reason_code` and `outcome_facet` are never empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofCard {
    pub proof_card_ref: String,
    pub profile_ref: String,
    pub verdict: CardVerdict,
    pub window_ref: String,
    pub reason_code: Vec<String>,
    pub enforcement_path_ref: String,
    pub authority_scope_ref: String,
    pub validity_horizon_ref: String,
    pub validity_verdict: String,
    pub basis_ref: String,
    pub sample_count: usize,
    pub p50: Vec<Facet>,
    pub p95: Vec<Facet>,
    pub p5: Vec<Facet>,
    pub outcome_facet: Vec<Facet>,
    pub event_type: Vec<String>,
    pub evidence_bundle_ref: String,
    pub manifest_ref: String,
    pub generated_at: DateTime<Utc>,
}

fn card_ref() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("pc-{}", &id[..12])
}

/// Builds v1.3 cards from raw window records.
#[derive(Default)]
pub struct ProofCardGenerator {
    registry: ProfileRegistry,
}

impl ProofCardGenerator {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Generate a card for `records` under `profile_ref`.
    ///
    /// Apart from the card reference and timestamp, the output is a pure
    /// function of the inputs.
    pub fn generate(
        &self,
        records: &[MetricRecord],
        profile_ref: &str,
        window_ref: &str,
        manifest_ref: &str,
    ) -> ProofCard {
        let profile = self.registry.get(profile_ref);
        let n = records.len();

        let mut card = ProofCard {
            proof_card_ref: card_ref(),
            profile_ref: profile_ref.to_string(),
            verdict: CardVerdict::InsufficientEvidence,
            window_ref: window_ref.to_string(),
            reason_code: vec![],
            enforcement_path_ref: ENFORCEMENT_PATH_REF.to_string(),
            authority_scope_ref: AUTHORITY_SCOPE_REF.to_string(),
            validity_horizon_ref: VALIDITY_HORIZON_REF.to_string(),
            validity_verdict: VALIDITY_VERDICT.to_string(),
            basis_ref: BASIS_REF.to_string(),
            sample_count: n,
            p50: vec![],
            p95: vec![],
            p5: vec![],
            outcome_facet: vec![],
            event_type: vec![],
            evidence_bundle_ref: format!("bundle:{window_ref}"),
            manifest_ref: manifest_ref.to_string(),
            generated_at: Utc::now(),
        };

        if n < profile.min_samples() {
            card.reason_code = vec![REASON_INSUFFICIENT_SAMPLES.to_string()];
            card.outcome_facet = vec![Facet::new("sample_count", n as f64, "count")];
            debug!(
                profile = profile_ref,
                samples = n,
                min = profile.min_samples(),
                "ProofCard: insufficient evidence"
            );
            return card;
        }

        let mut p = Percentiles::default();
        for (metric, values) in extract_vectors(records) {
            let (p50, p95, p5) = p50_p95_p5(&values);
            p.p50.insert(metric.to_string(), p50);
            p.p95.insert(metric.to_string(), p95);
            p.p5.insert(metric.to_string(), p5);
        }

        let reasons = profile.check(&p);
        if reasons.is_empty() {
            card.verdict = CardVerdict::Ready;
            card.reason_code = vec![REASON_CHECKS_PASSED.to_string()];
        } else {
            card.verdict = CardVerdict::NotReady;
            card.reason_code = reasons;
        }

        card.outcome_facet = profile.outcome_facets(card.verdict, &p);
        if card.outcome_facet.is_empty() {
            card.outcome_facet = vec![Facet::new("no_metric_data", 0.0, "none")];
        }
        card.p50 = facets(&p.p50, "p50");
        card.p95 = facets(&p.p95, "p95");
        card.p5 = facets(&p.p5, "p5");

        debug!(
            profile = profile_ref,
            samples = n,
            verdict = %card.verdict,
            reasons = ?card.reason_code,
            "ProofCard generated"
        );
        card
    }
}
