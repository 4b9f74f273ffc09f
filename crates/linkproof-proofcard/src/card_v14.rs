//! ProofCard v1.4: the v1.3 card with admission, grade and privacy overlay.
//!
//! The card splits its governance data into a minimal section that is always
//! safe to export and a privacy-sensitive section that only leaves the device
//! when the egress gate allows full disclosure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::admission::{compute_admission, AdmissionEffect, AdmissionVerdict, EvidenceGrade};
use crate::attempt::AttemptCtx;
use crate::card::{ProofCard, ProofCardGenerator};
use crate::hooks::{
    byuse_qualify, egress_gate, enforce_admission, privacy_check, EgressMode, EgressResult,
    PrivacyVerdict,
};
use crate::metrics::MetricRecord;
use crate::privacy::PrivacyConfig;
use crate::profile::ProfileRegistry;

/// Always exportable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinSection {
    pub admission_verdict: AdmissionVerdict,
    pub admission_effect: AdmissionEffect,
    pub privacy_check_verdict: PrivacyVerdict,
    pub egress_receipt_ref: Option<String>,
    pub egress_mode: Option<EgressMode>,
    pub usage_context_ref: Option<String>,
}

/// Exportable only under `PRIV_ALLOWED`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivSection {
    pub privacy_policy_ref: Option<String>,
    pub purpose_ref: Option<String>,
    pub retention_ref: Option<String>,
    pub disclosure_scope_ref: Option<String>,
    pub redaction_profile_ref: String,
    pub privacy_violation_flag: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofCardV14 {
    #[serde(flatten)]
    pub card: ProofCard,
    pub attempt_id: String,
    pub evidence_grade: EvidenceGrade,
    pub enforcement_path_id: String,
    pub gate_ref: String,
    pub version_refs: BTreeMap<String, String>,
    pub missing_evidence_class: Vec<String>,
    pub upgrade_requirements_ref: Option<String>,
    pub min: MinSection,
    #[serde(rename = "priv", default, skip_serializing_if = "Option::is_none")]
    pub priv_section: Option<PrivSection>,
}

impl ProofCardV14 {
    /// The card as it may be sent off the device under `egress`.
    ///
    /// The privacy-sensitive section is dropped unless the gate allowed full
    /// disclosure for this very attempt and admission did not restrict egress.
    pub fn outbound(&self, egress: &EgressResult) -> ProofCardV14 {
        let mut card = self.clone();
        let restricted = matches!(
            self.min.admission_effect,
            AdmissionEffect::FreezeEgress | AdmissionEffect::EgressMinOnly
        );
        if restricted
            || egress.mode != EgressMode::PrivAllowed
            || egress.attempt_id != self.attempt_id
        {
            card.priv_section = None;
        }
        card
    }
}

fn merge_unique(target: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

// ── Generator ───────────────────────────────────────────────────────────

pub struct ProofCardGeneratorV14 {
    v13: ProofCardGenerator,
    config: PrivacyConfig,
}

impl ProofCardGeneratorV14 {
    pub fn new(config: PrivacyConfig) -> Self {
        Self::with_registry(ProfileRegistry::with_builtins(), config)
    }

    pub fn with_registry(registry: ProfileRegistry, config: PrivacyConfig) -> Self {
        Self {
            v13: ProofCardGenerator::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    /// Generate a v1.4 card for one attempt.
    pub fn generate(
        &self,
        records: &[MetricRecord],
        ctx: &AttemptCtx,
        manifest_ref: &str,
    ) -> ProofCardV14 {
        let mut card = self
            .v13
            .generate(records, &ctx.profile_ref, &ctx.window_ref, manifest_ref);

        let policy = self.config.profile_policy(&ctx.profile_ref);
        let privacy = privacy_check(ctx, &self.config);
        let byuse = byuse_qualify(ctx, &self.config);
        let admission = compute_admission(card.verdict, &privacy, &byuse, &policy);

        merge_unique(&mut card.reason_code, &privacy.reason_code);
        merge_unique(&mut card.reason_code, &byuse.reason_code);

        let mut missing_evidence_class = privacy.missing.clone();
        merge_unique(&mut missing_evidence_class, &byuse.missing);

        let refs = &privacy.priv_refs;
        let priv_section = PrivSection {
            privacy_policy_ref: refs.get("privacy_policy_ref").cloned(),
            purpose_ref: refs.get("purpose_ref").cloned(),
            retention_ref: refs.get("retention_ref").cloned(),
            disclosure_scope_ref: refs.get("disclosure_scope_ref").cloned(),
            redaction_profile_ref: refs
                .get("redaction_profile_ref")
                .cloned()
                .unwrap_or_else(|| policy.default_redaction_profile.clone()),
            privacy_violation_flag: privacy.verdict == PrivacyVerdict::Fail,
        };

        debug!(
            attempt_id = %ctx.attempt_id,
            verdict = %card.verdict,
            privacy = %privacy.verdict,
            grade = %admission.evidence_grade,
            admission = %admission.admission_verdict,
            "ProofCard v1.4 assembled"
        );

        ProofCardV14 {
            card,
            attempt_id: ctx.attempt_id.clone(),
            evidence_grade: admission.evidence_grade,
            enforcement_path_id: ctx.enforcement_path_id.clone(),
            gate_ref: ctx.gate_ref.clone(),
            version_refs: ctx.version_refs.clone(),
            missing_evidence_class,
            upgrade_requirements_ref: byuse.upgrade_requirements_ref,
            min: MinSection {
                admission_verdict: admission.admission_verdict,
                admission_effect: admission.admission_effect,
                privacy_check_verdict: privacy.verdict,
                egress_receipt_ref: None,
                egress_mode: None,
                usage_context_ref: ctx.usage_context_ref.clone(),
            },
            priv_section: Some(priv_section),
        }
    }

    /// Run the egress gate, narrow it by the card's admission effect and
    /// record the receipt in the card's minimal section.
    pub fn apply_egress_gate(&self, card: &mut ProofCardV14, ctx: &AttemptCtx) -> EgressResult {
        let gated = egress_gate(ctx, card, &self.config);
        let result = enforce_admission(gated, card.min.admission_effect);
        card.min.egress_receipt_ref = Some(result.egress_receipt_ref.clone());
        card.min.egress_mode = Some(result.mode);
        info!(
            attempt_id = %card.attempt_id,
            receipt = %result.egress_receipt_ref,
            mode = %result.mode,
            "Egress receipt issued"
        );
        result
    }
}

impl Default for ProofCardGeneratorV14 {
    fn default() -> Self {
        Self::new(PrivacyConfig::builtin())
    }
}
