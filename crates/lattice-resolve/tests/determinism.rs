//! Resolution determinism: the winner never depends on input order.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use lattice_core::ids::{IdKind, LatticeId};
use lattice_core::keys::{AssertionKey, BASE_SCENARIO, HAS_PROPERTY};
use lattice_core::models::{AssertionRecord, Confidence, SourceRef, SourceType};
use lattice_resolve::resolve;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn arb_record(sources: Vec<LatticeId>) -> impl Strategy<Value = AssertionRecord> {
    (
        0..sources.len(),
        0i64..60,
        prop::option::of(60i64..120),
        0u8..=10,
        prop::bool::ANY,
    )
        .prop_map(move |(src, recorded, valid_to, conf, manual)| AssertionRecord {
            id: LatticeId::mint(IdKind::Assertion),
            workspace_id: "ws1".to_string(),
            assertion_key: AssertionKey::property("ws1", "Connection", "c1", "speed"),
            relationship_type: HAS_PROPERTY.to_string(),
            property_key: Some("speed".to_string()),
            raw_hash: String::new(),
            normalized_hash: String::new(),
            source_type: if manual {
                SourceType::Manual
            } else {
                SourceType::Spreadsheet
            },
            source_ref: SourceRef::default(),
            source_id: sources[src],
            import_run_id: None,
            recorded_at: t(recorded),
            valid_from: t(0),
            valid_to: valid_to.map(t),
            scenario_id: BASE_SCENARIO.to_string(),
            confidence: Confidence::new(f64::from(conf) / 10.0),
            supersedes: None,
        })
}

proptest! {
    #[test]
    fn winner_is_stable_under_permutation(
        seed in any::<u64>(),
        records in {
            let sources = vec![
                LatticeId::mint(IdKind::Source),
                LatticeId::mint(IdKind::Source),
                LatticeId::mint(IdKind::Source),
            ];
            prop::collection::vec(arb_record(sources), 0..12)
        },
    ) {
        let ranks: HashMap<LatticeId, i64> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == 0)
            .map(|(i, r)| (r.source_id, (i % 3) as i64))
            .collect();
        let as_of = t(45);

        let baseline = resolve(&records, &ranks, BASE_SCENARIO, as_of)
            .winner
            .map(|w| w.id);

        // Deterministic pseudo-shuffle driven by the seed.
        let mut shuffled = records.clone();
        let mut state = seed | 1;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }

        let perturbed = resolve(&shuffled, &ranks, BASE_SCENARIO, as_of)
            .winner
            .map(|w| w.id);
        prop_assert_eq!(baseline, perturbed);

        // Same input, repeated call: same winner.
        let again = resolve(&records, &ranks, BASE_SCENARIO, as_of)
            .winner
            .map(|w| w.id);
        prop_assert_eq!(baseline, again);
    }
}
