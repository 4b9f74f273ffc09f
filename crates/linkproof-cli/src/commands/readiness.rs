//! Readiness command

use std::path::Path;

use colored::*;
use linkproof_observation::{ReadinessScorer, ReadinessVerdict};
use tabled::Tabled;

use super::read_bundle;
use crate::error::CliResult;
use crate::output::{emit, print_table, OutputFormat};

#[derive(Tabled)]
struct MeanRow {
    metric: String,
    mean: String,
}

pub fn execute(bundle: &Path, format: OutputFormat, out: Option<&Path>) -> CliResult<()> {
    let bundle = read_bundle(bundle)?;
    let result = ReadinessScorer::default().score(&bundle.timeline.samples());

    if format != OutputFormat::Table || out.is_some() {
        return emit(&result, format, out);
    }

    let verdict = match result.verdict {
        ReadinessVerdict::Pass => result.verdict.to_string().green(),
        ReadinessVerdict::Marginal => result.verdict.to_string().yellow(),
        ReadinessVerdict::Fail => result.verdict.to_string().red(),
    };
    println!("Verdict:    {}", verdict);
    println!("Factor:     {:?}", result.dominant_factor);
    println!("Confidence: {:.2}", result.confidence);
    println!("Samples:    {}", result.sample_count);
    println!("Reasons:    {}", result.reason_codes.join(", "));
    println!();
    print_table(
        result
            .means
            .iter()
            .map(|(metric, mean)| MeanRow {
                metric: metric.clone(),
                mean: format!("{mean:.2}"),
            })
            .collect(),
    );
    Ok(())
}
