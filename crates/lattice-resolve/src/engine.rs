//! The ranking pipeline. Every step is a strict tiebreaker feeding the
//! next; the final step cannot tie, so the result is a total order and the
//! winner is unique for a given input set.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lattice_core::ids::LatticeId;
use lattice_core::keys::BASE_SCENARIO;
use lattice_core::models::{AssertionRecord, SourceType};

/// Why a claim lost to the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    /// Not in the target scenario or its base fallback.
    ScenarioMismatch,
    /// A scenario-matching claim shadows the base claim.
    ScenarioShadowed,
    /// A manual claim overrides all non-manual ones.
    ManualOverride,
    /// A source with a lower (stronger) authority rank exists.
    LowerAuthority,
    /// A more recently recorded claim exists.
    OlderRecord,
    /// A higher-confidence claim exists.
    LowerConfidence,
    /// Lost the deterministic id tiebreak.
    IdTiebreak,
}

/// One claim annotated with its standing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedAssertion {
    pub record: AssertionRecord,
    pub is_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LossReason>,
}

/// The resolved view of one assertion key.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub winner: Option<AssertionRecord>,
}

fn rank_of(record: &AssertionRecord, ranks: &HashMap<LatticeId, i64>) -> i64 {
    // Missing authority rank means lowest priority.
    ranks.get(&record.source_id).copied().unwrap_or(i64::MAX)
}

fn passes_temporal(record: &AssertionRecord, as_of: DateTime<Utc>) -> bool {
    record.valid_from <= as_of && record.valid_to.map_or(true, |end| as_of < end)
}

/// Run the pipeline over indices into `records`, producing the winner index
/// and a per-record loss reason for everything that passed the temporal
/// filter.
fn run(
    records: &[AssertionRecord],
    ranks: &HashMap<LatticeId, i64>,
    scenario_id: &str,
    as_of: DateTime<Utc>,
) -> (Option<usize>, Vec<Option<LossReason>>) {
    let mut reasons: Vec<Option<LossReason>> = vec![None; records.len()];

    // 1. Temporal filter.
    let mut alive: Vec<usize> = (0..records.len())
        .filter(|&i| passes_temporal(&records[i], as_of))
        .collect();
    if alive.is_empty() {
        return (None, reasons);
    }

    // 2. Scenario preference. Claims outside the target scenario and base
    //    never win; base is shadowed when the target scenario speaks.
    let eliminate = |alive: &mut Vec<usize>,
                         reasons: &mut Vec<Option<LossReason>>,
                         keep: &dyn Fn(&AssertionRecord) -> bool,
                         reason: LossReason| {
        if alive.iter().any(|&i| keep(&records[i])) {
            alive.retain(|&i| {
                let kept = keep(&records[i]);
                if !kept {
                    reasons[i] = Some(reason);
                }
                kept
            });
        }
    };

    eliminate(
        &mut alive,
        &mut reasons,
        &|r| r.scenario_id == scenario_id || r.scenario_id == BASE_SCENARIO,
        LossReason::ScenarioMismatch,
    );
    if scenario_id != BASE_SCENARIO {
        eliminate(
            &mut alive,
            &mut reasons,
            &|r| r.scenario_id == scenario_id,
            LossReason::ScenarioShadowed,
        );
    }

    // 3. Manual override.
    eliminate(
        &mut alive,
        &mut reasons,
        &|r| r.source_type == SourceType::Manual,
        LossReason::ManualOverride,
    );

    // 4. Authority: keep the minimum rank.
    if let Some(best) = alive.iter().map(|&i| rank_of(&records[i], ranks)).min() {
        eliminate(
            &mut alive,
            &mut reasons,
            &|r| rank_of(r, ranks) == best,
            LossReason::LowerAuthority,
        );
    }

    // 5. Recency: keep the maximum recorded_at.
    if let Some(newest) = alive.iter().map(|&i| records[i].recorded_at).max() {
        eliminate(
            &mut alive,
            &mut reasons,
            &|r| r.recorded_at == newest,
            LossReason::OlderRecord,
        );
    }

    // 6. Confidence.
    if let Some(best) = alive
        .iter()
        .map(|&i| records[i].confidence.value())
        .fold(None::<f64>, |acc, c| Some(acc.map_or(c, |a| a.max(c))))
    {
        eliminate(
            &mut alive,
            &mut reasons,
            &|r| r.confidence.value() == best,
            LossReason::LowerConfidence,
        );
    }

    // 7. Deterministic tiebreak: minimum assertion id.
    if let Some(smallest) = alive.iter().map(|&i| records[i].id).min() {
        eliminate(
            &mut alive,
            &mut reasons,
            &|r| r.id == smallest,
            LossReason::IdTiebreak,
        );
    }

    (alive.first().copied(), reasons)
}

/// Resolve one key to at most one winner.
pub fn resolve(
    records: &[AssertionRecord],
    ranks: &HashMap<LatticeId, i64>,
    scenario_id: &str,
    as_of: DateTime<Utc>,
) -> Resolution {
    let (winner, _) = run(records, ranks, scenario_id, as_of);
    Resolution {
        winner: winner.map(|i| records[i].clone()),
    }
}

/// All-claims view: every record passing the temporal filter, annotated
/// with the winner flag and the step it lost at.
pub fn resolve_all_claims(
    records: &[AssertionRecord],
    ranks: &HashMap<LatticeId, i64>,
    scenario_id: &str,
    as_of: DateTime<Utc>,
) -> Vec<AnnotatedAssertion> {
    let (winner, reasons) = run(records, ranks, scenario_id, as_of);
    records
        .iter()
        .enumerate()
        .filter(|(i, r)| passes_temporal(r, as_of) || reasons[*i].is_some())
        .map(|(i, r)| AnnotatedAssertion {
            record: r.clone(),
            is_winner: winner == Some(i),
            reason: reasons[i],
        })
        .collect()
}
