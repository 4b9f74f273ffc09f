//! Subcommand implementations

pub mod fingerprint;
pub mod policy;
pub mod proofcard;
pub mod readiness;

use std::path::Path;

use linkproof_observation::{load_bundle, EvidenceBundle};
use tracing::info;

use crate::error::CliResult;

/// Load and verify a bundle.
pub(crate) fn read_bundle(path: &Path) -> CliResult<EvidenceBundle> {
    let bundle = load_bundle(path)?;
    info!(
        path = %path.display(),
        episode_id = %bundle.episode_id,
        points = bundle.timeline.metrics_points.len(),
        "Bundle loaded"
    );
    Ok(bundle)
}
