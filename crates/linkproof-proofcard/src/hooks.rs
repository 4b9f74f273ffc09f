//! Privacy hooks: validity check, usage-triggered upgrade and egress gate.
//!
//! All three are pure functions of the attempt context and the policy. They
//! only look at governance references, never at sample payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::admission::{AdmissionEffect, EvidenceGrade};
use crate::attempt::{AttemptCtx, EgressRequest, GOVERNANCE_REF_NAMES};
use crate::card_v14::ProofCardV14;
use crate::privacy::{FailAction, PrivacyConfig};

pub const RC_PRIVACY_NOT_APPLICABLE: &str = "RC_PRIVACY_NOT_APPLICABLE";
pub const RC_PRIVACY_PASS: &str = "RC_PRIVACY_PASS";
pub const RC_PRIVACY_FAIL: &str = "RC_PRIVACY_FAIL";
pub const RC_POLICY_DRIFT: &str = "RC_POLICY_DRIFT";
pub const RC_BYUSE_UNKNOWN_CONTEXT: &str = "RC_BYUSE_UNKNOWN_CONTEXT";
pub const RC_BYUSE_MISSING_REFS: &str = "RC_BYUSE_MISSING_REFS";
pub const RC_BYUSE_QUALIFIED: &str = "RC_BYUSE_QUALIFIED";
pub const RC_EGRESS_MIN_ONLY: &str = "RC_EGRESS_MIN_ONLY";
pub const RC_EGRESS_DENIED_MISSING_AUTH: &str = "RC_EGRESS_DENIED_MISSING_AUTH";
pub const RC_EGRESS_PRIV_ALLOWED: &str = "RC_EGRESS_PRIV_ALLOWED";
pub const RC_EGRESS_ADMISSION_OVERRIDE: &str = "RC_EGRESS_ADMISSION_OVERRIDE";

pub const MISSING_PRIVACY_POLICY: &str = "PRIVACY_POLICY_MISSING";
pub const MISSING_SCOPE: &str = "SCOPE_UNBOUND";
pub const MISSING_RETENTION: &str = "RETENTION_UNKNOWN";
pub const PRIVACY_STALE: &str = "PRIVACY_STALE";
pub const USAGE_POLICY_UNDEFINED: &str = "BYUSE_POLICY_UNDEFINED";

// ── Privacy Validity ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivacyVerdict {
    Pass,
    Fail,
    Inconclusive,
    NotApplicable,
}

impl fmt::Display for PrivacyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Inconclusive => "INCONCLUSIVE",
            Self::NotApplicable => "NOT_APPLICABLE",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyResult {
    pub verdict: PrivacyVerdict,
    pub missing: Vec<String>,
    pub reason_code: Vec<String>,
    /// Set only on FAIL.
    pub admission_override: Option<FailAction>,
    /// Governance references present on the attempt, by name.
    #[serde(default)]
    pub priv_refs: BTreeMap<String, String>,
}

fn present_refs(ctx: &AttemptCtx) -> BTreeMap<String, String> {
    GOVERNANCE_REF_NAMES
        .iter()
        .filter_map(|name| {
            ctx.governance
                .get(name)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Check that the governance references required by the profile exist and
/// are current.
pub fn privacy_check(ctx: &AttemptCtx, config: &PrivacyConfig) -> PrivacyResult {
    let policy = config.profile_policy(&ctx.profile_ref);
    let priv_refs = present_refs(ctx);

    if !policy.privacy_validity_precondition {
        return PrivacyResult {
            verdict: PrivacyVerdict::NotApplicable,
            missing: vec![],
            reason_code: vec![RC_PRIVACY_NOT_APPLICABLE.to_string()],
            admission_override: None,
            priv_refs,
        };
    }

    let mut missing = Vec::new();
    let mut reason_code = Vec::new();
    let checks = [
        ("privacy_policy_ref", MISSING_PRIVACY_POLICY),
        ("disclosure_scope_ref", MISSING_SCOPE),
        ("retention_ref", MISSING_RETENTION),
    ];
    for (name, marker) in checks {
        if !priv_refs.contains_key(name) {
            missing.push(marker.to_string());
        }
    }
    if ctx.policy_is_stale() {
        missing.push(PRIVACY_STALE.to_string());
        reason_code.push(RC_POLICY_DRIFT.to_string());
    }

    if missing.is_empty() {
        reason_code.push(RC_PRIVACY_PASS.to_string());
        PrivacyResult {
            verdict: PrivacyVerdict::Pass,
            missing,
            reason_code,
            admission_override: None,
            priv_refs,
        }
    } else {
        reason_code.push(RC_PRIVACY_FAIL.to_string());
        warn!(
            attempt_id = %ctx.attempt_id,
            profile = %ctx.profile_ref,
            missing = ?missing,
            action = %policy.on_privacy_fail,
            "Privacy check failed"
        );
        PrivacyResult {
            verdict: PrivacyVerdict::Fail,
            missing,
            reason_code,
            admission_override: Some(policy.on_privacy_fail),
            priv_refs,
        }
    }
}

// ── Usage-Triggered Upgrade ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByuseResult {
    pub is_triggered: bool,
    pub required_additions: Vec<String>,
    pub missing: Vec<String>,
    pub upgrade_requirements_ref: Option<String>,
    pub evidence_grade_floor: EvidenceGrade,
    pub reason_code: Vec<String>,
}

impl ByuseResult {
    fn not_triggered() -> Self {
        Self {
            is_triggered: false,
            required_additions: vec![],
            missing: vec![],
            upgrade_requirements_ref: None,
            evidence_grade_floor: EvidenceGrade::DeliveryGrade,
            reason_code: vec![],
        }
    }
}

/// Raise the evidence bar when the attempt declares a downstream use.
pub fn byuse_qualify(ctx: &AttemptCtx, config: &PrivacyConfig) -> ByuseResult {
    let Some(context) = ctx.usage_context_ref.as_deref().filter(|c| !c.is_empty()) else {
        return ByuseResult::not_triggered();
    };

    let Some(policy) = config.usage_policy(context) else {
        warn!(
            attempt_id = %ctx.attempt_id,
            usage_context = context,
            "Unknown usage context"
        );
        return ByuseResult {
            is_triggered: true,
            required_additions: vec![],
            missing: vec![USAGE_POLICY_UNDEFINED.to_string()],
            upgrade_requirements_ref: None,
            evidence_grade_floor: EvidenceGrade::NotClosureGrade,
            reason_code: vec![RC_BYUSE_UNKNOWN_CONTEXT.to_string()],
        };
    };

    let missing: Vec<String> = policy
        .required_refs
        .iter()
        .filter(|name| ctx.resolve_ref(name).is_none())
        .map(|name| name.to_uppercase())
        .collect();

    if missing.is_empty() {
        return ByuseResult {
            is_triggered: true,
            required_additions: vec![],
            missing,
            upgrade_requirements_ref: None,
            evidence_grade_floor: EvidenceGrade::PartialReliance,
            reason_code: vec![RC_BYUSE_QUALIFIED.to_string()],
        };
    }

    ByuseResult {
        is_triggered: true,
        required_additions: policy.required_refs.clone(),
        missing,
        upgrade_requirements_ref: Some(format!("UPGRADE-{}", ctx.attempt_id)),
        evidence_grade_floor: policy.on_missing,
        reason_code: vec![RC_BYUSE_MISSING_REFS.to_string()],
    }
}

// ── Egress Gate ─────────────────────────────────────────────────────────

/// Disclosure decided by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EgressMode {
    MinOnly,
    PrivAllowed,
    Deny,
}

impl fmt::Display for EgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MinOnly => "MIN_ONLY",
            Self::PrivAllowed => "PRIV_ALLOWED",
            Self::Deny => "DENY",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressResult {
    pub allowed: bool,
    pub mode: EgressMode,
    /// Fresh for every gate decision.
    pub egress_receipt_ref: String,
    /// Attempt the receipt is bound to.
    pub attempt_id: String,
    pub disclosed_fields_ref: Option<String>,
    pub reason_code: Vec<String>,
}

fn receipt_ref() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("EGRESS-REC-{}", &id[..12])
}

/// Decide what part of `card` may leave the device.
pub fn egress_gate(ctx: &AttemptCtx, card: &ProofCardV14, config: &PrivacyConfig) -> EgressResult {
    let receipt = receipt_ref();
    let attempt_id = card.attempt_id.clone();

    if ctx.egress_request() == EgressRequest::MinOnly {
        return EgressResult {
            allowed: true,
            mode: EgressMode::MinOnly,
            egress_receipt_ref: receipt,
            attempt_id,
            disclosed_fields_ref: None,
            reason_code: vec![RC_EGRESS_MIN_ONLY.to_string()],
        };
    }

    let missing: Vec<String> = config
        .egress_gate
        .allow_priv_export_if
        .requires
        .iter()
        .filter(|name| ctx.resolve_ref(name).is_none())
        .map(|name| name.to_uppercase())
        .collect();

    if !missing.is_empty() {
        warn!(
            attempt_id = %attempt_id,
            receipt = %receipt,
            missing = ?missing,
            "Full disclosure denied"
        );
        return EgressResult {
            allowed: false,
            mode: EgressMode::Deny,
            egress_receipt_ref: receipt,
            attempt_id,
            disclosed_fields_ref: None,
            reason_code: vec![RC_EGRESS_DENIED_MISSING_AUTH.to_string()],
        };
    }

    EgressResult {
        allowed: true,
        mode: EgressMode::PrivAllowed,
        egress_receipt_ref: receipt,
        attempt_id,
        disclosed_fields_ref: ctx.governance.disclosure_scope_ref.clone(),
        reason_code: vec![RC_EGRESS_PRIV_ALLOWED.to_string()],
    }
}

/// Narrow a gate decision to what the card's admission effect still allows.
///
/// `FREEZE_EGRESS` denies every disclosure and `EGRESS_MIN_ONLY` caps it at
/// the minimal section. The receipt is kept; the override is recorded in its
/// reason codes.
pub fn enforce_admission(mut result: EgressResult, effect: AdmissionEffect) -> EgressResult {
    let capped = match effect {
        AdmissionEffect::FreezeEgress if result.mode != EgressMode::Deny => EgressMode::Deny,
        AdmissionEffect::EgressMinOnly if result.mode == EgressMode::PrivAllowed => {
            EgressMode::MinOnly
        }
        _ => return result,
    };

    warn!(
        attempt_id = %result.attempt_id,
        receipt = %result.egress_receipt_ref,
        requested = %result.mode,
        granted = %capped,
        effect = %effect,
        "Egress narrowed by admission"
    );
    result.mode = capped;
    result.allowed = capped != EgressMode::Deny;
    result.disclosed_fields_ref = None;
    result.reason_code.push(RC_EGRESS_ADMISSION_OVERRIDE.to_string());
    result
}
