use proptest::prelude::*;
use serde_json::{json, Value};

use linkproof_proofcard::{nearest_rank, p50_p95_p5, MetricRecord, ProofCardGenerator};

proptest! {
    #[test]
    fn quantile_ignores_input_order(
        mut values in proptest::collection::vec(-1000.0f64..1000.0, 1..60),
        p in 0.0f64..=100.0,
    ) {
        let forward = nearest_rank(&values, p);
        values.reverse();
        prop_assert_eq!(forward, nearest_rank(&values, p));
    }

    #[test]
    fn quantile_is_an_input_value(
        values in proptest::collection::vec(-1000.0f64..1000.0, 1..60),
        p in 0.0f64..=100.0,
    ) {
        let q = nearest_rank(&values, p);
        prop_assert!(values.contains(&q));
    }

    #[test]
    fn percentiles_are_ordered(values in proptest::collection::vec(0.0f64..500.0, 1..60)) {
        let (p50, p95, p5) = p50_p95_p5(&values);
        prop_assert!(p5 <= p50 && p50 <= p95);
    }

    #[test]
    fn every_card_has_reason_and_outcome(
        rtts in proptest::collection::vec(0.0f64..400.0, 0..40),
        profile in prop_oneof![
            Just("BASE"),
            Just("WIFI78_INSTALL_ACCEPT"),
            Just("FWA_CONGESTION_SUSPECT"),
            Just("CABLE_UPSTREAM_INTERMITTENT"),
            Just("UNREGISTERED"),
        ],
    ) {
        let records: Vec<MetricRecord> = rtts
            .iter()
            .map(|r| match json!({"latency_ms": r}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            })
            .collect();
        let card = ProofCardGenerator::default().generate(&records, profile, "W", "m");
        prop_assert!(!card.reason_code.is_empty());
        prop_assert!(!card.outcome_facet.is_empty());
        prop_assert_eq!(card.sample_count, rtts.len());
    }
}
