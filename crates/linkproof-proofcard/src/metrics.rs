//! Metric extraction from raw window records.
//!
//! Records are loose JSON objects from whatever produced the window. Each
//! canonical metric has an ordered alias list; the first alias that yields at
//! least one numeric value wins. Records missing the field are skipped, never
//! defaulted.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProofCardResult;

/// One raw sample as a JSON object.
pub type MetricRecord = Map<String, Value>;

/// A canonical metric and the record keys it may appear under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricAlias {
    pub canonical: &'static str,
    pub unit: &'static str,
    pub aliases: &'static [&'static str],
}

/// Canonical metrics in facet order.
pub const METRIC_ALIASES: &[MetricAlias] = &[
    MetricAlias {
        canonical: "rtt_ms",
        unit: "ms",
        aliases: &["rtt_ms", "latency_ms", "rtt", "latency_p95_ms"],
    },
    MetricAlias {
        canonical: "loss_pct",
        unit: "pct",
        aliases: &["loss_pct", "loss_percent", "loss"],
    },
    MetricAlias {
        canonical: "us_rtt_ms",
        unit: "ms",
        aliases: &["us_rtt_ms", "us_latency"],
    },
    MetricAlias {
        canonical: "throughput_mbps",
        unit: "mbps",
        aliases: &["throughput_mbps", "throughput"],
    },
];

/// Unit of a canonical metric, `"auto"` when unknown.
pub fn unit_of(canonical: &str) -> &'static str {
    METRIC_ALIASES
        .iter()
        .find(|m| m.canonical == canonical)
        .map_or("auto", |m| m.unit)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Values of `key` across records, skipping records without a usable number.
pub fn values_of(records: &[MetricRecord], key: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.get(key).and_then(numeric))
        .filter(|v| v.is_finite())
        .collect()
}

/// Vector per canonical metric. Metrics with no values are absent.
pub fn extract_vectors(records: &[MetricRecord]) -> BTreeMap<&'static str, Vec<f64>> {
    let mut out = BTreeMap::new();
    for metric in METRIC_ALIASES {
        let found = metric
            .aliases
            .iter()
            .map(|alias| values_of(records, alias))
            .find(|values| !values.is_empty());
        if let Some(values) = found {
            out.insert(metric.canonical, values);
        }
    }
    out
}

/// Convert serializable samples into raw records. Non-object items are dropped.
pub fn records_from<T: Serialize>(items: &[T]) -> ProofCardResult<Vec<MetricRecord>> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        if let Value::Object(map) = serde_json::to_value(item)? {
            records.push(map);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> MetricRecord {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn first_alias_with_values_wins() {
        let records = vec![
            rec(json!({"rtt": 10.0, "latency_ms": 30.0})),
            rec(json!({"rtt": 12.0})),
        ];
        let v = extract_vectors(&records);
        assert_eq!(v["rtt_ms"], vec![30.0]);
    }

    #[test]
    fn falls_back_to_later_alias() {
        let records = vec![rec(json!({"rtt": 10.0})), rec(json!({"rtt": 12.0}))];
        assert_eq!(extract_vectors(&records)["rtt_ms"], vec![10.0, 12.0]);
    }

    #[test]
    fn missing_fields_are_skipped_not_zeroed() {
        let records = vec![
            rec(json!({"loss_pct": 0.5})),
            rec(json!({"other": 1})),
            rec(json!({"loss_pct": null})),
            rec(json!({"loss_pct": "0.7"})),
            rec(json!({"loss_pct": "n/a"})),
        ];
        let v = extract_vectors(&records);
        assert_eq!(v["loss_pct"], vec![0.5, 0.7]);
        assert!(!v.contains_key("rtt_ms"));
    }

    #[test]
    fn units() {
        assert_eq!(unit_of("rtt_ms"), "ms");
        assert_eq!(unit_of("throughput_mbps"), "mbps");
        assert_eq!(unit_of("mystery"), "auto");
    }

    #[test]
    fn records_from_structs() {
        #[derive(Serialize)]
        struct Point {
            latency_p95_ms: Option<f64>,
        }
        let records = records_from(&[
            Point {
                latency_p95_ms: Some(40.0),
            },
            Point {
                latency_p95_ms: None,
            },
        ])
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(extract_vectors(&records)["rtt_ms"], vec![40.0]);
    }
}
