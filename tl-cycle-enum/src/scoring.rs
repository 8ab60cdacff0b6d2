//! Composite quality scoring for discovered cycles

use serde::{Deserialize, Serialize};
use tl_common::{ItemIx, TradeStep};
use tl_graph_store::GraphSnapshot;

/// Weights for the four scoring components; must not be assumed to sum to
/// exactly 1.0 by callers, but the shipped defaults do
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight on the length component (shorter cycles preferred)
    pub length: f64,
    /// Weight on the fairness component (balanced per-step values preferred)
    pub fairness: f64,
    /// Weight on the demand component (more-wanted items preferred)
    pub demand: f64,
    /// Weight on the value-efficiency component
    pub value_efficiency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { length: 0.30, fairness: 0.30, demand: 0.20, value_efficiency: 0.20 }
    }
}

/// The four individual scoring components, retained for diagnostics
/// alongside the composite `quality_score`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreBreakdown {
    /// Length component
    pub length: f64,
    /// Fairness component
    pub fairness: f64,
    /// Demand component
    pub demand: f64,
    /// Value-efficiency component
    pub value_efficiency: f64,
    /// Weighted composite in `[0, 1]`
    pub composite: f64,
}

/// Score a candidate cycle
///
/// `edge_items` gives, per step, the item indices selected for that edge
/// (parallel to `steps`), used to look up values and demand without
/// re-deriving the selection policy here.
pub fn score_cycle(
    snapshot: &GraphSnapshot,
    steps: &[TradeStep],
    edge_items: &[Vec<ItemIx>],
    weights: &ScoringWeights,
    max_depth: usize,
) -> ScoreBreakdown {
    let k = steps.len();
    let length = length_score(k, max_depth);

    let two_party = k == 2;
    let edge_values: Vec<Option<f64>> = edge_items
        .iter()
        .map(|items| {
            let mut sum = 0.0;
            let mut any_known = false;
            for &item in items {
                if let Some(v) = snapshot.estimated_value(item) {
                    sum += v;
                    any_known = true;
                }
            }
            any_known.then_some(sum)
        })
        .collect();

    let (fairness, value_efficiency) = if two_party {
        (1.0, 1.0)
    } else {
        (fairness_score(&edge_values), value_efficiency_score(&edge_values))
    };

    let demand = demand_score(snapshot, edge_items);

    let composite = (weights.length * length
        + weights.fairness * fairness
        + weights.demand * demand
        + weights.value_efficiency * value_efficiency)
        .clamp(0.0, 1.0);

    ScoreBreakdown { length, fairness, demand, value_efficiency, composite }
}

fn length_score(k: usize, max_depth: usize) -> f64 {
    if max_depth == 0 {
        return 0.0;
    }
    (1.0 - (k as f64 - 2.0) / max_depth as f64).clamp(0.0, 1.0)
}

fn fairness_score(edge_values: &[Option<f64>]) -> f64 {
    let known: Vec<f64> = edge_values.iter().filter_map(|v| *v).collect();
    if known.len() < edge_values.len() || known.len() < 2 {
        // Missing values anywhere: fall back to equal-weight fairness
        // rather than guessing at a distribution.
        return 1.0;
    }

    let mean = known.iter().sum::<f64>() / known.len() as f64;
    if mean <= 0.0 {
        return 1.0;
    }
    let variance = known.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / known.len() as f64;
    let cv = variance.sqrt() / mean;

    let penalty = if cv <= 0.10 { cv } else { 0.10 + 2.0 * (cv - 0.10) };
    (1.0 - penalty).max(0.0)
}

fn value_efficiency_score(edge_values: &[Option<f64>]) -> f64 {
    let known: Vec<f64> = edge_values.iter().filter_map(|v| *v).collect();
    if known.len() < edge_values.len() || known.is_empty() {
        return 1.0;
    }

    let mean = known.iter().sum::<f64>() / known.len() as f64;
    if mean <= 0.0 {
        return 1.0;
    }
    let mean_diff = known.iter().map(|v| (v - mean).abs()).sum::<f64>() / known.len() as f64;
    (1.0 - mean_diff / mean).clamp(0.0, 1.0)
}

fn demand_score(snapshot: &GraphSnapshot, edge_items: &[Vec<ItemIx>]) -> f64 {
    let counts: Vec<usize> =
        edge_items.iter().flatten().map(|&item| wanters_of(snapshot, item)).collect();
    if counts.is_empty() {
        return 0.0;
    }
    let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    // Saturating logarithmic curve: 0 wanters -> 0, grows toward 1 without
    // needing an externally supplied maximum to normalize against.
    1.0 - 1.0 / (1.0 + (1.0 + avg).ln())
}

fn wanters_of(snapshot: &GraphSnapshot, item: ItemIx) -> usize {
    snapshot.all_wallets().filter(|&w| snapshot.wanted(w).contains(&item)).count()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn length_score_prefers_shorter_cycles() {
        assert!(length_score(2, 10) > length_score(8, 10));
        assert_eq!(length_score(2, 10), 1.0);
    }

    #[test]
    fn fairness_falls_back_to_neutral_without_values() {
        assert_eq!(fairness_score(&[None, None]), 1.0);
    }

    #[test]
    fn fairness_penalizes_high_variance() {
        let balanced = fairness_score(&[Some(10.0), Some(10.0), Some(10.0)]);
        let skewed = fairness_score(&[Some(1.0), Some(10.0), Some(100.0)]);
        assert!(balanced > skewed);
        assert_eq!(balanced, 1.0);
    }

    #[test]
    fn value_efficiency_of_identical_values_is_perfect() {
        assert_eq!(value_efficiency_score(&[Some(5.0), Some(5.0)]), 1.0);
    }
}
