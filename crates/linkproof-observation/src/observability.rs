//! Observability / opacity assessment of the most recent change event.
//!
//! An incident is only explainable when the change that preceded it carries
//! enough referenceable metadata. No recent event at all is never read as
//! "nothing changed": it is opaque.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::ChangeEventCard;
use crate::types::is_known;

/// Reference category a change event failed to provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRef {
    OriginHint,
    ChangeRef,
    VersionRefs,
    /// No change event was available to consult.
    NoChangeEventDetected,
}

impl fmt::Display for MissingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OriginHint => "origin_hint",
            Self::ChangeRef => "change_ref",
            Self::VersionRefs => "version_refs",
            Self::NoChangeEventDetected => "no_change_event_detected",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservabilityStatus {
    Sufficient,
    Insufficient,
}

/// Outcome of the opacity check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityResult {
    pub status: ObservabilityStatus,
    pub opaque_risk: bool,
    pub missing_refs: Vec<MissingRef>,
    /// Origin hint of the consulted event, when it had one.
    pub origin_hint: Option<String>,
}

impl ObservabilityResult {
    pub fn is_sufficient(&self) -> bool {
        self.status == ObservabilityStatus::Sufficient
    }
}

/// Decides whether a change event is referenceable enough to explain an incident.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObservabilityChecker;

impl ObservabilityChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, latest_event: Option<&ChangeEventCard>) -> ObservabilityResult {
        let Some(event) = latest_event else {
            return ObservabilityResult {
                status: ObservabilityStatus::Insufficient,
                opaque_risk: true,
                missing_refs: vec![MissingRef::NoChangeEventDetected],
                origin_hint: None,
            };
        };

        let mut missing = Vec::new();
        if !is_known(event.origin_hint.as_deref()) {
            missing.push(MissingRef::OriginHint);
        }
        if !is_known(event.change_ref.as_deref()) {
            missing.push(MissingRef::ChangeRef);
        }
        if event.version_refs.is_unknown() {
            missing.push(MissingRef::VersionRefs);
        }

        let opaque = !missing.is_empty();
        ObservabilityResult {
            status: if opaque {
                ObservabilityStatus::Insufficient
            } else {
                ObservabilityStatus::Sufficient
            },
            opaque_risk: opaque,
            missing_refs: missing,
            origin_hint: event.origin_hint.clone(),
        }
    }
}
