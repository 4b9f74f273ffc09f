//! Evidence grade and admission decision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::card::CardVerdict;
use crate::hooks::{PrivacyResult, PrivacyVerdict, ByuseResult};
use crate::privacy::{FailAction, ProfilePolicy};

/// Strength of a card as evidence, weakest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceGrade {
    NotClosureGrade,
    PartialReliance,
    DeliveryGrade,
}

impl fmt::Display for EvidenceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotClosureGrade => "NOT_CLOSURE_GRADE",
            Self::PartialReliance => "PARTIAL_RELIANCE",
            Self::DeliveryGrade => "DELIVERY_GRADE",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionVerdict {
    Admit,
    Degrade,
    Deny,
}

impl fmt::Display for AdmissionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admit => "ADMIT",
            Self::Degrade => "DEGRADE",
            Self::Deny => "DENY",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionEffect {
    None,
    FreezeEgress,
    EgressMinOnly,
    ScopeReduction,
}

impl fmt::Display for AdmissionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "NONE",
            Self::FreezeEgress => "FREEZE_EGRESS",
            Self::EgressMinOnly => "EGRESS_MIN_ONLY",
            Self::ScopeReduction => "SCOPE_REDUCTION",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub evidence_grade: EvidenceGrade,
    pub admission_verdict: AdmissionVerdict,
    pub admission_effect: AdmissionEffect,
}

/// Combine the card verdict with the privacy and usage results.
///
/// A privacy FAIL always yields `NOT_CLOSURE_GRADE` and never `ADMIT`.
pub fn compute_admission(
    verdict: CardVerdict,
    privacy: &PrivacyResult,
    usage: &ByuseResult,
    policy: &ProfilePolicy,
) -> Admission {
    match privacy.verdict {
        PrivacyVerdict::Fail => {
            let action = privacy.admission_override.unwrap_or(policy.on_privacy_fail);
            let (admission_verdict, admission_effect) = match action {
                FailAction::Deny => (AdmissionVerdict::Deny, AdmissionEffect::FreezeEgress),
                FailAction::Degrade => (AdmissionVerdict::Degrade, AdmissionEffect::EgressMinOnly),
            };
            Admission {
                evidence_grade: EvidenceGrade::NotClosureGrade,
                admission_verdict,
                admission_effect,
            }
        }
        PrivacyVerdict::Inconclusive => degraded(),
        PrivacyVerdict::Pass | PrivacyVerdict::NotApplicable if verdict != CardVerdict::Ready => {
            degraded()
        }
        PrivacyVerdict::Pass | PrivacyVerdict::NotApplicable if usage.is_triggered => {
            let admission_effect = if usage.evidence_grade_floor == EvidenceGrade::PartialReliance {
                AdmissionEffect::None
            } else {
                AdmissionEffect::ScopeReduction
            };
            Admission {
                evidence_grade: usage.evidence_grade_floor,
                admission_verdict: AdmissionVerdict::Admit,
                admission_effect,
            }
        }
        PrivacyVerdict::Pass | PrivacyVerdict::NotApplicable => Admission {
            evidence_grade: EvidenceGrade::DeliveryGrade,
            admission_verdict: AdmissionVerdict::Admit,
            admission_effect: AdmissionEffect::None,
        },
    }
}

fn degraded() -> Admission {
    Admission {
        evidence_grade: EvidenceGrade::NotClosureGrade,
        admission_verdict: AdmissionVerdict::Degrade,
        admission_effect: AdmissionEffect::None,
    }
}
