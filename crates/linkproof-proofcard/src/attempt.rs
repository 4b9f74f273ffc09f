//! Attempt context threaded through the privacy hooks.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::card::ENFORCEMENT_PATH_REF;

pub const DEFAULT_GATE_REF: &str = "GATE-DEFAULT-01";

/// Governance reference names an attempt can carry.
pub const GOVERNANCE_REF_NAMES: &[&str] = &[
    "privacy_policy_ref",
    "purpose_ref",
    "retention_ref",
    "disclosure_scope_ref",
    "redaction_profile_ref",
    "authority_scope_ref",
];

/// Requested disclosure level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressRequest {
    #[default]
    #[serde(alias = "MIN_ONLY")]
    MinOnly,
    #[serde(alias = "priv", alias = "FULL_WITH_AUTH")]
    FullWithAuth,
}

impl fmt::Display for EgressRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MinOnly => "min_only",
            Self::FullWithAuth => "full_with_auth",
        })
    }
}

impl FromStr for EgressRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min_only" | "MIN_ONLY" | "min" => Ok(Self::MinOnly),
            "full_with_auth" | "FULL_WITH_AUTH" | "priv" => Ok(Self::FullWithAuth),
            other => Err(format!(
                "unknown egress mode '{other}' (expected min_only or full_with_auth)"
            )),
        }
    }
}

/// Privacy governance references supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceRefs {
    pub privacy_policy_ref: Option<String>,
    pub purpose_ref: Option<String>,
    pub retention_ref: Option<String>,
    pub disclosure_scope_ref: Option<String>,
    pub redaction_profile_ref: Option<String>,
    pub authority_scope_ref: Option<String>,
}

impl GovernanceRefs {
    /// Look a reference up by name. Empty strings count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "privacy_policy_ref" => &self.privacy_policy_ref,
            "purpose_ref" => &self.purpose_ref,
            "retention_ref" => &self.retention_ref,
            "disclosure_scope_ref" => &self.disclosure_scope_ref,
            "redaction_profile_ref" => &self.redaction_profile_ref,
            "authority_scope_ref" => &self.authority_scope_ref,
            _ => return None,
        };
        non_empty(value.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn attempt_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("att-{}", &id[..12])
}

/// Input for one card generation attempt.
///
/// Built once with the `with_*` methods, then only borrowed by the hooks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCtx {
    pub attempt_id: String,
    pub profile_ref: String,
    pub enforcement_path_id: String,
    pub gate_ref: String,
    pub window_ref: String,
    pub version_refs: BTreeMap<String, String>,
    pub governance: GovernanceRefs,
    /// Version of the privacy policy the refs were issued under.
    pub privacy_policy_version: Option<String>,
    /// Version the device currently expects.
    pub expected_policy_version: Option<String>,
    pub usage_context_ref: Option<String>,
    pub proposed_egress: Option<EgressRequest>,
}

impl AttemptCtx {
    pub fn new(profile_ref: impl Into<String>, window_ref: impl Into<String>) -> Self {
        Self {
            attempt_id: attempt_id(),
            profile_ref: profile_ref.into(),
            enforcement_path_id: ENFORCEMENT_PATH_REF.to_string(),
            gate_ref: DEFAULT_GATE_REF.to_string(),
            window_ref: window_ref.into(),
            version_refs: BTreeMap::new(),
            governance: GovernanceRefs::default(),
            privacy_policy_version: None,
            expected_policy_version: None,
            usage_context_ref: None,
            proposed_egress: None,
        }
    }

    pub fn with_attempt_id(mut self, attempt_id: impl Into<String>) -> Self {
        self.attempt_id = attempt_id.into();
        self
    }

    pub fn with_version_ref(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.version_refs.insert(name.into(), value.into());
        self
    }

    pub fn with_governance(mut self, governance: GovernanceRefs) -> Self {
        self.governance = governance;
        self
    }

    pub fn with_policy_versions(
        mut self,
        issued: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        self.privacy_policy_version = Some(issued.into());
        self.expected_policy_version = Some(expected.into());
        self
    }

    pub fn with_usage_context(mut self, context: impl Into<String>) -> Self {
        self.usage_context_ref = Some(context.into());
        self
    }

    pub fn with_egress(mut self, request: EgressRequest) -> Self {
        self.proposed_egress = Some(request);
        self
    }

    /// Resolve a named reference against governance refs, the window
    /// reference and finally the version refs.
    pub fn resolve_ref(&self, name: &str) -> Option<&str> {
        if GOVERNANCE_REF_NAMES.contains(&name) {
            return self.governance.get(name);
        }
        if name == "window_ref" {
            return non_empty(Some(self.window_ref.as_str()));
        }
        non_empty(self.version_refs.get(name).map(|v| v.as_str()))
    }

    /// True when both versions are known and differ.
    pub fn policy_is_stale(&self) -> bool {
        match (
            non_empty(self.privacy_policy_version.as_deref()),
            non_empty(self.expected_policy_version.as_deref()),
        ) {
            (Some(issued), Some(expected)) => issued != expected,
            _ => false,
        }
    }

    /// Egress mode in effect: absent means minimal.
    pub fn egress_request(&self) -> EgressRequest {
        self.proposed_egress.unwrap_or_default()
    }
}
