//! Privacy policy configuration.
//!
//! Declarative YAML with three sections: per-profile privacy policies,
//! usage-context policies and egress gate settings. Loading never fails the
//! caller: a missing or malformed file falls back to built-in defaults, and
//! the fallback is reported through [`ConfigSource`] and a warning.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::admission::EvidenceGrade;
use crate::attempt::{EgressRequest, GOVERNANCE_REF_NAMES};
use crate::error::{ProofCardError, ProofCardResult};

/// What happens to admission when the privacy check fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailAction {
    Deny,
    Degrade,
}

impl fmt::Display for FailAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deny => "DENY",
            Self::Degrade => "DEGRADE",
        })
    }
}

fn default_applicability() -> String {
    "METADATA_ONLY".to_string()
}

fn default_on_privacy_fail() -> FailAction {
    FailAction::Degrade
}

fn default_redaction_profile() -> String {
    "REDACT.MIN".to_string()
}

fn default_disclosure_scope() -> String {
    "SCOPE.MIN".to_string()
}

fn default_retention() -> String {
    "RET.7D".to_string()
}

/// Privacy policy for one profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePolicy {
    /// Open token describing what kind of data the profile touches.
    #[serde(default = "default_applicability")]
    pub privacy_applicability: String,
    /// When false the privacy check is not applicable to this profile.
    #[serde(default)]
    pub privacy_validity_precondition: bool,
    #[serde(default = "default_on_privacy_fail")]
    pub on_privacy_fail: FailAction,
    #[serde(default = "default_redaction_profile")]
    pub default_redaction_profile: String,
    #[serde(default = "default_disclosure_scope")]
    pub default_disclosure_scope: String,
    #[serde(default = "default_retention")]
    pub default_retention: String,
}

impl Default for ProfilePolicy {
    fn default() -> Self {
        Self {
            privacy_applicability: default_applicability(),
            privacy_validity_precondition: false,
            on_privacy_fail: default_on_privacy_fail(),
            default_redaction_profile: default_redaction_profile(),
            default_disclosure_scope: default_disclosure_scope(),
            default_retention: default_retention(),
        }
    }
}

fn default_on_missing() -> EvidenceGrade {
    EvidenceGrade::NotClosureGrade
}

/// Requirements raised by a declared downstream use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsagePolicy {
    #[serde(default)]
    pub required_refs: Vec<String>,
    #[serde(default = "default_on_missing")]
    pub on_missing: EvidenceGrade,
}

impl Default for UsagePolicy {
    fn default() -> Self {
        Self {
            required_refs: vec![],
            on_missing: default_on_missing(),
        }
    }
}

fn default_priv_requires() -> Vec<String> {
    vec![
        "disclosure_scope_ref".to_string(),
        "authority_scope_ref".to_string(),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivExportRule {
    /// Attempt references that must all be present for full disclosure.
    #[serde(default = "default_priv_requires")]
    pub requires: Vec<String>,
}

impl Default for PrivExportRule {
    fn default() -> Self {
        Self {
            requires: default_priv_requires(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Egress gate settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressGateConfig {
    /// Mode for attempts that request nothing. Only `min_only` is accepted.
    #[serde(default)]
    pub default_mode: EgressRequest,
    #[serde(default)]
    pub allow_priv_export_if: PrivExportRule,
    /// Receipts are mandatory; `false` is rejected at load.
    #[serde(default = "default_true")]
    pub always_emit_egress_receipt: bool,
}

impl Default for EgressGateConfig {
    fn default() -> Self {
        Self {
            default_mode: EgressRequest::MinOnly,
            allow_priv_export_if: PrivExportRule::default(),
            always_emit_egress_receipt: true,
        }
    }
}

/// Top-level privacy configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub profile_policies: BTreeMap<String, ProfilePolicy>,
    #[serde(default, alias = "byuse_policies")]
    pub usage_policies: BTreeMap<String, UsagePolicy>,
    #[serde(default)]
    pub egress_gate: EgressGateConfig,
}

/// Where the effective configuration came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ConfigSource {
    File { path: String },
    Defaults { reason: String },
}

impl ConfigSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Defaults { .. })
    }
}

impl PrivacyConfig {
    /// Built-in policies used when no configuration file is available.
    pub fn builtin() -> Self {
        let mut profile_policies = BTreeMap::new();
        profile_policies.insert(
            "PROFILE_OPENRAN_RIC".to_string(),
            ProfilePolicy {
                privacy_applicability: "USER_AFFECTING".to_string(),
                privacy_validity_precondition: true,
                on_privacy_fail: FailAction::Deny,
                ..ProfilePolicy::default()
            },
        );
        profile_policies.insert(
            "WIFI78_INSTALL_ACCEPT".to_string(),
            ProfilePolicy {
                privacy_applicability: "METADATA_ONLY".to_string(),
                privacy_validity_precondition: false,
                on_privacy_fail: FailAction::Degrade,
                ..ProfilePolicy::default()
            },
        );

        let mut usage_policies = BTreeMap::new();
        usage_policies.insert(
            "SUPPORT_CLOSURE".to_string(),
            UsagePolicy {
                required_refs: [
                    "policy_snapshot_ref",
                    "window_policy_id",
                    "window_ref",
                    "privacy_policy_ref",
                    "disclosure_scope_ref",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                on_missing: EvidenceGrade::NotClosureGrade,
            },
        );

        Self {
            profile_policies,
            usage_policies,
            egress_gate: EgressGateConfig::default(),
        }
    }

    /// Strict parse of a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ProofCardResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Strict load from a file.
    pub fn from_file(path: impl AsRef<Path>) -> ProofCardResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Load from `path`, falling back to [`PrivacyConfig::builtin`] on any
    /// failure. `None` selects the defaults directly.
    pub fn load(path: Option<&Path>) -> (Self, ConfigSource) {
        let Some(path) = path else {
            info!("No privacy policy file given, using built-in defaults");
            return (
                Self::builtin(),
                ConfigSource::Defaults {
                    reason: "no policy file given".to_string(),
                },
            );
        };

        match Self::from_file(path) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    profiles = config.profile_policies.len(),
                    usage_contexts = config.usage_policies.len(),
                    "Privacy policy loaded"
                );
                (
                    config,
                    ConfigSource::File {
                        path: path.display().to_string(),
                    },
                )
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Privacy policy unusable, falling back to built-in defaults"
                );
                (
                    Self::builtin(),
                    ConfigSource::Defaults {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    pub fn validate(&self) -> ProofCardResult<()> {
        if self.egress_gate.default_mode != EgressRequest::MinOnly {
            return Err(ProofCardError::InvalidPolicy(
                "egress_gate.default_mode must be min_only".into(),
            ));
        }
        if !self.egress_gate.always_emit_egress_receipt {
            return Err(ProofCardError::InvalidPolicy(
                "egress receipts cannot be disabled".into(),
            ));
        }
        for name in &self.egress_gate.allow_priv_export_if.requires {
            if !GOVERNANCE_REF_NAMES.contains(&name.as_str()) {
                return Err(ProofCardError::InvalidPolicy(format!(
                    "egress_gate.allow_priv_export_if.requires: unknown reference '{name}'"
                )));
            }
        }
        for (context, policy) in &self.usage_policies {
            if policy.on_missing == EvidenceGrade::DeliveryGrade {
                return Err(ProofCardError::InvalidPolicy(format!(
                    "usage_policies.{context}.on_missing cannot be DELIVERY_GRADE"
                )));
            }
        }
        Ok(())
    }

    /// Policy for `profile_ref`; unknown profiles get the default policy.
    pub fn profile_policy(&self, profile_ref: &str) -> ProfilePolicy {
        self.profile_policies
            .get(profile_ref)
            .cloned()
            .unwrap_or_default()
    }

    pub fn usage_policy(&self, context: &str) -> Option<&UsagePolicy> {
        self.usage_policies.get(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
profile_policies:
  PROFILE_OPENRAN_RIC:
    privacy_applicability: USER_AFFECTING
    privacy_validity_precondition: true
    on_privacy_fail: DENY
byuse_policies:
  COMPLIANCE_DEFENSE:
    required_refs: [privacy_policy_ref, retention_ref]
egress_gate:
  allow_priv_export_if:
    requires: [disclosure_scope_ref]
"#;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("linkproof-privacy-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn parses_document_with_legacy_alias() {
        let c = PrivacyConfig::from_yaml_str(SAMPLE).unwrap();
        let p = c.profile_policy("PROFILE_OPENRAN_RIC");
        assert!(p.privacy_validity_precondition);
        assert_eq!(p.on_privacy_fail, FailAction::Deny);
        assert_eq!(p.default_retention, "RET.7D");

        let u = c.usage_policy("COMPLIANCE_DEFENSE").unwrap();
        assert_eq!(u.on_missing, EvidenceGrade::NotClosureGrade);
        assert_eq!(c.egress_gate.allow_priv_export_if.requires, vec!["disclosure_scope_ref"]);
        assert!(c.egress_gate.always_emit_egress_receipt);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = PrivacyConfig::from_yaml_str("profile_policies: {}\nsurprise: 1\n").unwrap_err();
        assert!(matches!(err, ProofCardError::Yaml(_)));

        let err = PrivacyConfig::from_yaml_str(
            "profile_policies:\n  P:\n    on_privacy_fail: DENY\n    typo_field: true\n",
        )
        .unwrap_err();
        assert!(matches!(err, ProofCardError::Yaml(_)));
    }

    #[test]
    fn receipts_cannot_be_disabled() {
        let err = PrivacyConfig::from_yaml_str("egress_gate:\n  always_emit_egress_receipt: false\n")
            .unwrap_err();
        assert!(matches!(err, ProofCardError::InvalidPolicy(_)));
    }

    #[test]
    fn priv_requirements_must_name_known_refs() {
        let err = PrivacyConfig::from_yaml_str(
            "egress_gate:\n  allow_priv_export_if:\n    requires: [badge_number]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("badge_number"));
    }

    #[test]
    fn unknown_profile_gets_default_policy() {
        let c = PrivacyConfig::builtin();
        let p = c.profile_policy("NOBODY");
        assert!(!p.privacy_validity_precondition);
        assert_eq!(p.on_privacy_fail, FailAction::Degrade);
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let (c, source) = PrivacyConfig::load(None);
        assert_eq!(c, PrivacyConfig::builtin());
        assert!(source.is_fallback());
    }

    #[test]
    fn load_missing_file_falls_back() {
        let path = temp_path("missing.yaml");
        let (c, source) = PrivacyConfig::load(Some(&path));
        assert_eq!(c, PrivacyConfig::builtin());
        match source {
            ConfigSource::Defaults { reason } => assert!(!reason.is_empty()),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn load_malformed_file_falls_back() {
        let path = temp_path("bad.yaml");
        std::fs::write(&path, "profile_policies: [not, a, map]\n").unwrap();
        let (c, source) = PrivacyConfig::load(Some(&path));
        assert_eq!(c, PrivacyConfig::builtin());
        assert!(source.is_fallback());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_valid_file() {
        let path = temp_path("ok.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let (c, source) = PrivacyConfig::load(Some(&path));
        assert!(c.usage_policy("COMPLIANCE_DEFENSE").is_some());
        assert!(c.usage_policy("SUPPORT_CLOSURE").is_none());
        assert!(matches!(source, ConfigSource::File { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn uppercase_egress_mode_parses() {
        let c = PrivacyConfig::from_yaml_str(
            "egress_gate:\n  default_mode: MIN_ONLY\n  always_emit_egress_receipt: true\n",
        )
        .unwrap();
        assert_eq!(c.egress_gate.default_mode, EgressRequest::MinOnly);

        let err = PrivacyConfig::from_yaml_str("egress_gate:\n  default_mode: FULL_WITH_AUTH\n")
            .unwrap_err();
        assert!(err.to_string().contains("default_mode must be min_only"));
    }
}
