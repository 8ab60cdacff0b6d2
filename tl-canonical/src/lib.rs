//! Produces a canonical id for a trade cycle, independent of rotation or
//! direction
//!
//! `canonicalize` is pure, total, and collision-free for distinct logical
//! cycles (mod hash-free string equality). It is deliberately O(k^2) in the
//! naive form described by the spec; `k` is bounded by `max_depth` (<= 15),
//! so this never matters in practice.
#![deny(missing_docs)]

use tl_common::{CanonicalId, ItemId, TradeStep, WalletId};

/// A single directed edge within a cycle, as seen by the canonicalizer
#[derive(Clone, Debug, PartialEq, Eq)]
struct Edge {
    from: WalletId,
    to: WalletId,
    items: Vec<ItemId>,
}

impl Edge {
    fn from_step(step: &TradeStep) -> Self {
        let mut items = step.items.clone();
        items.sort();
        Self { from: step.from.clone(), to: step.to.clone(), items }
    }

    fn reversed(&self) -> Self {
        Self { from: self.to.clone(), to: self.from.clone(), items: self.items.clone() }
    }

    fn key_fragment(&self) -> String {
        let items = self.items.iter().map(|i| i.0.as_str()).collect::<Vec<_>>().join(",");
        format!("{}>{}:{}", self.from.0, self.to.0, items)
    }
}

/// Compute the canonical id of a cycle expressed as an ordered list of
/// steps. The id is the lexicographically smallest string over all `2k`
/// rotations of the cycle and its reverse.
pub fn canonicalize(cycle: &[TradeStep]) -> CanonicalId {
    let edges: Vec<Edge> = cycle.iter().map(Edge::from_step).collect();
    let k = edges.len();
    if k == 0 {
        return CanonicalId(String::new());
    }

    let reversed: Vec<Edge> = edges.iter().rev().map(Edge::reversed).collect();

    let mut best: Option<String> = None;
    for rotation_base in [&edges, &reversed] {
        for start in 0..k {
            let key = (0..k)
                .map(|i| rotation_base[(start + i) % k].key_fragment())
                .collect::<Vec<_>>()
                .join("|");
            if best.as_ref().map(|b| key < *b).unwrap_or(true) {
                best = Some(key);
            }
        }
    }

    CanonicalId(best.expect("cycle has at least one edge"))
}

#[cfg(test)]
mod test {
    use super::canonicalize;
    use tl_common::TradeStep;

    fn step(from: &str, to: &str, items: &[&str]) -> TradeStep {
        TradeStep {
            from: from.into(),
            to: to.into(),
            items: items.iter().map(|i| (*i).into()).collect(),
        }
    }

    #[test]
    fn stable_under_rotation() {
        let c1 = vec![step("A", "B", &["a1"]), step("B", "C", &["b1"]), step("C", "A", &["c1"])];
        let c2 = vec![step("B", "C", &["b1"]), step("C", "A", &["c1"]), step("A", "B", &["a1"])];
        let c3 = vec![step("C", "A", &["c1"]), step("A", "B", &["a1"]), step("B", "C", &["b1"])];

        let id1 = canonicalize(&c1);
        assert_eq!(id1, canonicalize(&c2));
        assert_eq!(id1, canonicalize(&c3));
    }

    #[test]
    fn two_party_swap_is_direction_agnostic() {
        let c1 = vec![step("A", "B", &["a1"]), step("B", "A", &["b1"])];
        let c2 = vec![step("B", "A", &["b1"]), step("A", "B", &["a1"])];
        assert_eq!(canonicalize(&c1), canonicalize(&c2));
    }

    #[test]
    fn distinct_item_assignments_yield_distinct_ids() {
        let c1 = vec![step("A", "B", &["a1"]), step("B", "C", &["b1"]), step("C", "A", &["c1"])];
        let c2 = vec![step("A", "C", &["c1"]), step("C", "B", &["b2"]), step("B", "A", &["a2"])];
        assert_ne!(canonicalize(&c1), canonicalize(&c2));
    }

    #[test]
    fn item_order_within_an_edge_does_not_matter() {
        let c1 = vec![step("A", "B", &["a1", "a2"]), step("B", "A", &["b1"])];
        let c2 = vec![step("A", "B", &["a2", "a1"]), step("B", "A", &["b1"])];
        assert_eq!(canonicalize(&c1), canonicalize(&c2));
    }
}
