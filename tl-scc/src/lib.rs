//! Strongly-connected-component decomposition of the want-graph (C3)
//!
//! Runs Tarjan's algorithm in O(V+E) with a wall-clock budget; on expiry
//! the finder returns whatever SCCs it has already closed plus a
//! `timed_out` flag, per spec. Singleton SCCs with no self-loop are
//! discarded since cycles require at least two wallets. Grounded on the
//! `TarjanState`/`strongconnect` shape used for deterministic
//! multilateral-netting cycle detection in the pack (aerugo-SimCash's
//! settlement graph), generalized from a fixed vertex-index array to
//! `WalletIx` and from unconditional execution to a deadline check per
//! visited vertex.
#![deny(missing_docs)]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tl_common::WalletIx;
use tl_graph_store::GraphSnapshot;

/// The result of one SCC-finder run
#[derive(Debug, Default)]
pub struct SccResult {
    /// Non-trivial strongly connected components (size >= 2)
    pub components: Vec<Vec<WalletIx>>,
    /// Set when the wall-clock budget expired before the graph was fully
    /// explored; `components` still holds everything found up to that
    /// point
    pub timed_out: bool,
}

struct TarjanState {
    index: usize,
    indices: HashMap<WalletIx, usize>,
    lowlink: HashMap<WalletIx, usize>,
    on_stack: HashMap<WalletIx, bool>,
    stack: Vec<WalletIx>,
    sccs: Vec<Vec<WalletIx>>,
    deadline: Instant,
    timed_out: bool,
}

/// Find all strongly connected components of `snapshot`'s want-graph,
/// stopping early if `budget` elapses
pub fn find_sccs(snapshot: &GraphSnapshot, budget: Duration) -> SccResult {
    let vertices: Vec<WalletIx> = snapshot.all_wallets().collect();
    find_sccs_within(snapshot, &vertices, budget)
}

/// Find strongly connected components within the subgraph induced by
/// `vertices` only, stopping early if `budget` elapses
///
/// Used by the Delta Engine to re-run SCC decomposition over just the
/// affected-wallet-set plus its one-hop boundary, instead of the whole
/// tenant graph.
pub fn find_sccs_within(snapshot: &GraphSnapshot, vertices: &[WalletIx], budget: Duration) -> SccResult {
    let restrict: std::collections::HashSet<WalletIx> = vertices.iter().copied().collect();
    let mut state = TarjanState {
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashMap::new(),
        stack: Vec::new(),
        sccs: Vec::new(),
        deadline: Instant::now() + budget,
        timed_out: false,
    };

    let mut sorted = vertices.to_vec();
    sorted.sort_by_key(|w| w.0);
    for v in sorted {
        if state.timed_out {
            break;
        }
        if !state.indices.contains_key(&v) {
            strongconnect(snapshot, v, &restrict, &mut state);
        }
    }

    let components = state
        .sccs
        .into_iter()
        .filter(|scc| scc.len() >= 2)
        .map(|mut scc| {
            scc.sort_by_key(|w| w.0);
            scc
        })
        .collect();

    SccResult { components, timed_out: state.timed_out }
}

fn strongconnect(
    snapshot: &GraphSnapshot,
    v: WalletIx,
    restrict: &std::collections::HashSet<WalletIx>,
    state: &mut TarjanState,
) {
    if Instant::now() >= state.deadline {
        state.timed_out = true;
        return;
    }

    state.indices.insert(v, state.index);
    state.lowlink.insert(v, state.index);
    state.index += 1;
    state.stack.push(v);
    state.on_stack.insert(v, true);

    for w in snapshot.successors(v) {
        if !restrict.contains(&w) {
            continue;
        }
        if state.timed_out {
            return;
        }
        if !state.indices.contains_key(&w) {
            strongconnect(snapshot, w, restrict, state);
            let lv = state.lowlink[&v];
            let lw = *state.lowlink.get(&w).unwrap_or(&lv);
            state.lowlink.insert(v, lv.min(lw));
        } else if *state.on_stack.get(&w).unwrap_or(&false) {
            let lv = state.lowlink[&v];
            let iw = state.indices[&w];
            state.lowlink.insert(v, lv.min(iw));
        }
    }

    if state.lowlink.get(&v) == state.indices.get(&v) {
        let mut scc = Vec::new();
        loop {
            let w = state.stack.pop().expect("root node must close its own SCC");
            state.on_stack.insert(w, false);
            scc.push(w);
            if w == v {
                break;
            }
        }
        state.sccs.push(scc);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use tl_common::{TenantId, WalletId};
    use tl_graph_store::GraphStore;

    fn w(i: &str) -> WalletId {
        WalletId::from(i)
    }

    #[test]
    fn empty_graph_has_no_sccs() {
        let store = GraphStore::new(TenantId::from("t"), None);
        let result = find_sccs(&store.snapshot(), Duration::from_secs(1));
        assert!(result.components.is_empty());
        assert!(!result.timed_out);
    }

    #[test]
    fn mutual_pair_forms_one_scc() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"a1".into()).unwrap();

        let result = find_sccs(&store.snapshot(), Duration::from_secs(1));
        assert_eq!(result.components.len(), 1);
        assert_eq!(result.components[0].len(), 2);
    }

    #[test]
    fn acyclic_chain_has_no_non_trivial_sccs() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_owned(&w("C"), &"c1".into()).unwrap();
        // A wants B's item, B wants C's item, but nothing closes the loop
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"c1".into()).unwrap();

        let result = find_sccs(&store.snapshot(), Duration::from_secs(1));
        assert!(result.components.is_empty());
    }

    #[test]
    fn three_cycle_forms_one_scc() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_owned(&w("C"), &"c1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"c1".into()).unwrap();
        store.add_want(&w("C"), &"a1".into()).unwrap();

        let result = find_sccs(&store.snapshot(), Duration::from_secs(1));
        assert_eq!(result.components.len(), 1);
        assert_eq!(result.components[0].len(), 3);
    }

    #[test]
    fn zero_budget_times_out_immediately_on_nonempty_graph() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"a1".into()).unwrap();

        let result = find_sccs(&store.snapshot(), Duration::from_nanos(0));
        assert!(result.timed_out);
    }

    #[test]
    fn find_sccs_within_ignores_vertices_outside_the_restriction() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_owned(&w("C"), &"c1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"c1".into()).unwrap();
        store.add_want(&w("C"), &"a1".into()).unwrap();

        let snap = store.snapshot();
        let a = snap.wallet_ix(&w("A")).unwrap();
        let b = snap.wallet_ix(&w("B")).unwrap();

        let result = find_sccs_within(&snap, &[a, b], Duration::from_secs(1));
        assert!(result.components.is_empty(), "removing C should break the 3-cycle");
    }
}
