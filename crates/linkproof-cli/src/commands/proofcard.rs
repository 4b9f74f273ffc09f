//! ProofCard command

use std::path::{Path, PathBuf};

use clap::Args;
use colored::*;
use linkproof_observation::EvidenceBundle;
use linkproof_proofcard::{
    records_from, AdmissionVerdict, AttemptCtx, ConfigSource, EgressMode, EgressRequest,
    EgressResult, GovernanceRefs, ProofCardGeneratorV14, ProofCardV14,
};
use serde::Serialize;
use tabled::Tabled;

use super::{policy, read_bundle};
use crate::error::CliResult;
use crate::output::{emit, print_table, OutputFormat};

/// Arguments for `linkproof proofcard`
#[derive(Args, Debug)]
pub struct ProofCardArgs {
    /// Path to the evidence bundle
    pub bundle: PathBuf,

    /// Evaluation profile (unknown profiles use BASE)
    #[arg(long, default_value = "BASE")]
    pub profile: String,

    /// Declared downstream use of the card
    #[arg(long)]
    pub usage_context: Option<String>,

    /// Requested disclosure (min_only, full_with_auth)
    #[arg(long)]
    pub egress: Option<EgressRequest>,

    /// Privacy policy file
    #[arg(long, env = "LINKPROOF_POLICY")]
    pub policy: Option<PathBuf>,

    /// Version reference, repeatable (NAME=VALUE)
    #[arg(long = "version-ref", value_parser = parse_key_value)]
    pub version_refs: Vec<(String, String)>,

    #[arg(long)]
    pub privacy_policy_ref: Option<String>,

    #[arg(long)]
    pub purpose_ref: Option<String>,

    #[arg(long)]
    pub retention_ref: Option<String>,

    #[arg(long)]
    pub disclosure_scope_ref: Option<String>,

    #[arg(long)]
    pub redaction_profile_ref: Option<String>,

    #[arg(long)]
    pub authority_scope_ref: Option<String>,

    /// Privacy policy version the refs were issued under
    #[arg(long)]
    pub policy_version: Option<String>,

    /// Privacy policy version currently expected
    #[arg(long, requires = "policy_version")]
    pub expected_policy_version: Option<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

impl ProofCardArgs {
    fn attempt(&self, bundle: &EvidenceBundle) -> AttemptCtx {
        let mut ctx = AttemptCtx::new(self.profile.clone(), bundle.worst_window_ref.as_str())
            .with_governance(GovernanceRefs {
                privacy_policy_ref: self.privacy_policy_ref.clone(),
                purpose_ref: self.purpose_ref.clone(),
                retention_ref: self.retention_ref.clone(),
                disclosure_scope_ref: self.disclosure_scope_ref.clone(),
                redaction_profile_ref: self.redaction_profile_ref.clone(),
                authority_scope_ref: self.authority_scope_ref.clone(),
            });
        for (name, value) in &self.version_refs {
            ctx = ctx.with_version_ref(name.clone(), value.clone());
        }
        if let (Some(issued), Some(expected)) = (&self.policy_version, &self.expected_policy_version) {
            ctx = ctx.with_policy_versions(issued.clone(), expected.clone());
        }
        if let Some(context) = &self.usage_context {
            ctx = ctx.with_usage_context(context.clone());
        }
        if let Some(request) = self.egress {
            ctx = ctx.with_egress(request);
        }
        ctx
    }
}

/// What leaves the device: the outbound card and the gate's receipt.
#[derive(Serialize)]
struct ProofCardOutput {
    policy_source: ConfigSource,
    card: ProofCardV14,
    egress: EgressResult,
}

#[derive(Tabled)]
struct FacetRow {
    facet: String,
    value: String,
    unit: String,
}

fn manifest_ref(bundle: &EvidenceBundle) -> String {
    let hash = bundle.content_hash.as_str();
    format!("manifest:{}", hash.get(..16).unwrap_or(hash))
}

pub fn execute(args: ProofCardArgs, format: OutputFormat, out: Option<&Path>) -> CliResult<()> {
    let bundle = read_bundle(&args.bundle)?;
    let (config, policy_source) = policy::load(args.policy.as_deref());
    let records = records_from(&bundle.timeline.metrics_points)?;

    let ctx = args.attempt(&bundle);
    let generator = ProofCardGeneratorV14::new(config);
    let mut card = generator.generate(&records, &ctx, &manifest_ref(&bundle));
    let egress = generator.apply_egress_gate(&mut card, &ctx);
    let card = card.outbound(&egress);

    if format != OutputFormat::Table || out.is_some() {
        let output = ProofCardOutput {
            policy_source,
            card,
            egress,
        };
        return emit(&output, format, out);
    }

    let admission = match card.min.admission_verdict {
        AdmissionVerdict::Admit => "ADMIT".green(),
        AdmissionVerdict::Degrade => "DEGRADE".yellow(),
        AdmissionVerdict::Deny => "DENY".red(),
    };
    let egress_mode = match egress.mode {
        EgressMode::Deny => egress.mode.to_string().red(),
        _ => egress.mode.to_string().normal(),
    };
    println!("Card:       {}", card.card.proof_card_ref);
    println!("Profile:    {}", card.card.profile_ref);
    println!("Verdict:    {}", card.card.verdict.to_string().bold());
    println!("Grade:      {}", card.evidence_grade);
    println!("Admission:  {} ({})", admission, card.min.admission_effect);
    println!("Privacy:    {}", card.min.privacy_check_verdict);
    println!("Egress:     {} receipt {}", egress_mode, egress.egress_receipt_ref);
    println!("Reasons:    {}", card.card.reason_code.join(", "));
    if !card.missing_evidence_class.is_empty() {
        println!("Missing:    {}", card.missing_evidence_class.join(", "));
    }
    println!();
    print_table(
        card.card
            .p50
            .iter()
            .chain(&card.card.p95)
            .chain(&card.card.p5)
            .map(|f| FacetRow {
                facet: f.name.clone(),
                value: format!("{:.2}", f.value),
                unit: f.unit.clone(),
            })
            .collect(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("window_policy_id=WP-10-60").unwrap(),
            ("window_policy_id".to_string(), "WP-10-60".to_string())
        );
        assert!(parse_key_value("no_separator").is_err());
        assert!(parse_key_value("=value").is_err());
    }
}
