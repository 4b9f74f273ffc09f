//! Pre-change snapshots: reference-only records of configuration state.
//!
//! A snapshot keeps a content digest plus a handful of human-readable fields,
//! never the full configuration. The digest covers scope, capture time, type
//! and readable fields, so two captures of identical content still differ.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Why a snapshot was captured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    #[default]
    Periodic,
    PostInstall,
    PreIncident,
    PostIncident,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::PostInstall => "post_install",
            Self::PreIncident => "pre_incident",
            Self::PostIncident => "post_incident",
        }
    }
}

/// Snapshot reference: `"snap-"` followed by the first 12 hex chars of the digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotRefId(pub String);

impl fmt::Display for SnapshotRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference-only record of configuration state before a change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreChangeSnapshot {
    pub snapshot_ref_id: SnapshotRefId,
    pub scope: String,
    pub capture_time: DateTime<Utc>,
    /// Hex BLAKE3 digest over scope, time, type and readable fields.
    pub digest: String,
    pub snapshot_type: SnapshotType,
    pub readable_fields: BTreeMap<String, String>,
}

impl PreChangeSnapshot {
    /// Recompute the digest and compare against the stored one.
    pub fn verify_digest(&self) -> bool {
        compute_digest(
            &self.scope,
            self.capture_time,
            self.snapshot_type,
            &self.readable_fields,
        ) == self.digest
    }
}

fn compute_digest(
    scope: &str,
    capture_time: DateTime<Utc>,
    snapshot_type: SnapshotType,
    readable_fields: &BTreeMap<String, String>,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"|");
    hasher.update(
        capture_time
            .to_rfc3339_opts(SecondsFormat::Micros, true)
            .as_bytes(),
    );
    hasher.update(b"|");
    hasher.update(snapshot_type.as_str().as_bytes());
    for (k, v) in readable_fields {
        hasher.update(b"|");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Builds digested snapshots.
#[derive(Clone, Debug, Default)]
pub struct SnapshotManager;

impl SnapshotManager {
    pub fn new() -> Self {
        Self
    }

    /// Capture a snapshot of `scope` at `at`.
    pub fn capture(
        &self,
        scope: impl Into<String>,
        readable_fields: BTreeMap<String, String>,
        snapshot_type: SnapshotType,
        at: DateTime<Utc>,
    ) -> PreChangeSnapshot {
        let scope = scope.into();
        let digest = compute_digest(&scope, at, snapshot_type, &readable_fields);
        PreChangeSnapshot {
            snapshot_ref_id: SnapshotRefId(format!("snap-{}", &digest[..12])),
            scope,
            capture_time: at,
            digest,
            snapshot_type,
            readable_fields,
        }
    }
}
