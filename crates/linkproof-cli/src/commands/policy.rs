//! Policy command

use std::path::Path;

use linkproof_proofcard::{ConfigSource, PrivacyConfig};
use serde::Serialize;

use crate::error::CliResult;
use crate::output::{emit, print_warning, OutputFormat};

#[derive(Serialize)]
struct EffectivePolicy {
    source: ConfigSource,
    policy: PrivacyConfig,
}

/// Load the policy the way `proofcard` does, warning on fallback.
pub(crate) fn load(path: Option<&Path>) -> (PrivacyConfig, ConfigSource) {
    let (policy, source) = PrivacyConfig::load(path);
    if let ConfigSource::Defaults { reason } = &source {
        if path.is_some() {
            print_warning(&format!("Using built-in privacy policy: {reason}"));
        }
    }
    (policy, source)
}

pub fn execute(path: Option<&Path>, format: OutputFormat, out: Option<&Path>) -> CliResult<()> {
    let (policy, source) = load(path);
    let format = match format {
        OutputFormat::Table => OutputFormat::Yaml,
        other => other,
    };
    emit(&EffectivePolicy { source, policy }, format, out)
}
