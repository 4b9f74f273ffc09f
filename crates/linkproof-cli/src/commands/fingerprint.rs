//! Fingerprint command

use std::path::Path;

use colored::*;
use linkproof_observation::{FingerprintAnalyzer, SliceSummary, SplitMethod};
use tabled::Tabled;

use super::read_bundle;
use crate::error::CliResult;
use crate::output::{cell, emit, print_table, OutputFormat};

#[derive(Tabled)]
struct SliceRow {
    slice: &'static str,
    points: usize,
    latency_p95_ms: String,
    loss_pct: String,
    retry_pct: String,
    airtime_busy_pct: String,
}

impl SliceRow {
    fn new(slice: &'static str, summary: &SliceSummary) -> Self {
        let get = |name: &str| cell(summary.means.get(name).copied());
        Self {
            slice,
            points: summary.points,
            latency_p95_ms: get("latency_p95_ms"),
            loss_pct: get("loss_pct"),
            retry_pct: get("retry_pct"),
            airtime_busy_pct: get("airtime_busy_pct"),
        }
    }
}

pub fn execute(bundle: &Path, format: OutputFormat, out: Option<&Path>) -> CliResult<()> {
    let bundle = read_bundle(bundle)?;
    let fp = FingerprintAnalyzer::new().analyze(&bundle);

    if format != OutputFormat::Table || out.is_some() {
        return emit(&fp, format, out);
    }

    let split = match fp.split {
        SplitMethod::PeakLatency { peak_index } => format!("peak latency at point {peak_index}"),
        SplitMethod::EqualThirds => "equal thirds".to_string(),
    };
    println!("Episode:    {}", bundle.episode_id);
    println!("Verdict:    {}", bundle.primary_verdict.as_str().bold());
    println!("Points:     {}", fp.point_count);
    println!("Split:      {}", split);
    println!("Pattern:    {} ({:.2})", fp.pattern.to_string().cyan(), fp.confidence);
    println!();
    print_table(vec![
        SliceRow::new("before", &fp.before),
        SliceRow::new("during", &fp.during),
        SliceRow::new("after", &fp.after),
    ]);
    Ok(())
}
