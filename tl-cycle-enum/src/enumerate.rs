//! Per-community bounded-depth simple cycle enumeration (C5)
//!
//! A Johnson-style adaptation: for each start wallet `s`, DFS only through
//! successors with index >= `s` (so each simple cycle is discovered exactly
//! once, rooted at its lowest-indexed member) with blocked-node bookkeeping
//! to prune paths that cannot reach back to `s`. Grounded on the
//! deterministic sorted-adjacency, explicit-state traversal shape used for
//! multilateral netting cycle detection in the pack's settlement graph,
//! generalized from fixed-length triangle search to bounded-depth
//! Johnson-style circuit enumeration.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tl_common::{CanonicalId, ItemIx, TradeLoop, TradeStep, WalletIx};
use tl_graph_store::GraphSnapshot;
use tl_util::concurrency::CancellationCell;

use crate::dedup::DedupGate;
use crate::scoring::{score_cycle, ScoringWeights};
use crate::select::select_items;

/// Parameters governing one community's enumeration run
#[derive(Clone, Debug)]
pub struct EnumConfig {
    /// Hard cap on cycle length (1..=15; cycles always have at least 2
    /// steps, so 1 effectively finds none)
    pub max_depth: usize,
    /// Ceiling on cycles emitted for a single community
    pub max_cycles_per_scc: usize,
    /// Wall-clock budget for this community
    pub t_comm: Duration,
    /// Whether to select every tradable item per edge instead of one
    pub enable_bundling: bool,
    /// Scoring weights
    pub weights: ScoringWeights,
}

impl Default for EnumConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_cycles_per_scc: 10_000,
            t_comm: Duration::from_secs(5),
            enable_bundling: false,
            weights: ScoringWeights::default(),
        }
    }
}

/// Outcome of enumerating one community
#[derive(Debug, Default)]
pub struct CommunityResult {
    /// Discovered, scored, deduplicated loops
    pub loops: Vec<TradeLoop>,
    /// Total simple cycles found before dedup
    pub cycles_found: usize,
    /// Cycles discarded as exact duplicates of an already-emitted loop
    pub duplicates_suppressed: usize,
    /// Set when `max_cycles_per_scc` was hit before exhausting the search
    pub truncated: bool,
    /// Set when `t_comm` elapsed before exhausting the search
    pub timed_out: bool,
}

struct Search<'a> {
    snapshot: &'a GraphSnapshot,
    members: HashSet<WalletIx>,
    config: &'a EnumConfig,
    dedup: &'a DedupGate,
    cancel: &'a CancellationCell,
    deadline: Instant,
    result: CommunityResult,
    stop: bool,
}

/// Enumerate every simple cycle within `members` up to `config.max_depth`,
/// deduplicate through `dedup`, score, and return as ranked loops
pub fn enumerate_community(
    snapshot: &GraphSnapshot,
    members: &[WalletIx],
    config: &EnumConfig,
    dedup: &DedupGate,
    cancel: &CancellationCell,
) -> CommunityResult {
    let mut search = Search {
        snapshot,
        members: members.iter().copied().collect(),
        config,
        dedup,
        cancel,
        deadline: Instant::now() + config.t_comm,
        result: CommunityResult::default(),
        stop: false,
    };

    let mut sorted = members.to_vec();
    sorted.sort_by_key(|w| w.0);

    for &s in &sorted {
        if search.stop {
            break;
        }
        if Instant::now() >= search.deadline {
            search.result.timed_out = true;
            break;
        }
        if cancel.is_cancelled() {
            search.result.timed_out = true;
            break;
        }

        let mut blocked: HashSet<WalletIx> = HashSet::new();
        let mut block_map: HashMap<WalletIx, HashSet<WalletIx>> = HashMap::new();
        let mut path = vec![s];
        blocked.insert(s);
        circuit(&mut search, s, s, &mut path, &mut blocked, &mut block_map);
    }

    search.result
}

fn restricted_successors(search: &Search, v: WalletIx, s: WalletIx) -> Vec<WalletIx> {
    let mut out: Vec<WalletIx> = search
        .snapshot
        .successors(v)
        .into_iter()
        .filter(|&w| w.0 >= s.0 && search.members.contains(&w))
        .filter(|&w| {
            !search.snapshot.has_rejected_peer(v, w) && !search.snapshot.has_rejected_peer(w, v)
        })
        .filter(|&w| !search.snapshot.tradable_items(v, w).is_empty())
        .collect();
    out.sort_by_key(|w| w.0);
    out
}

fn unblock(v: WalletIx, blocked: &mut HashSet<WalletIx>, block_map: &mut HashMap<WalletIx, HashSet<WalletIx>>) {
    blocked.remove(&v);
    if let Some(set) = block_map.get_mut(&v) {
        let to_unblock: Vec<WalletIx> = set.drain().collect();
        for w in to_unblock {
            if blocked.contains(&w) {
                unblock(w, blocked, block_map);
            }
        }
    }
}

fn circuit(
    search: &mut Search,
    v: WalletIx,
    s: WalletIx,
    path: &mut Vec<WalletIx>,
    blocked: &mut HashSet<WalletIx>,
    block_map: &mut HashMap<WalletIx, HashSet<WalletIx>>,
) -> bool {
    if search.stop {
        return false;
    }
    if Instant::now() >= search.deadline {
        search.result.timed_out = true;
        search.stop = true;
        return false;
    }
    if search.cancel.is_cancelled() {
        search.result.timed_out = true;
        search.stop = true;
        return false;
    }

    let mut found = false;
    let successors = restricted_successors(search, v, s);

    for w in successors.clone() {
        if w == s && path.len() >= 2 {
            emit_cycle(search, path);
            found = true;
            if search.stop {
                break;
            }
        } else if path.len() < search.config.max_depth && !blocked.contains(&w) {
            path.push(w);
            if circuit(search, w, s, path, blocked, block_map) {
                found = true;
            }
            path.pop();
        }
        if search.stop {
            break;
        }
    }

    if found {
        unblock(v, blocked, block_map);
    } else {
        for w in successors {
            block_map.entry(w).or_default().insert(v);
        }
    }

    found
}

fn emit_cycle(search: &mut Search, path: &[WalletIx]) {
    if search.result.cycles_found >= search.config.max_cycles_per_scc {
        search.result.truncated = true;
        search.stop = true;
        return;
    }
    search.result.cycles_found += 1;

    let k = path.len();
    let mut steps = Vec::with_capacity(k);
    let mut edge_items = Vec::with_capacity(k);

    for i in 0..k {
        let u = path[i];
        let v = path[(i + 1) % k];
        let candidates = search.snapshot.tradable_items(u, v);
        if candidates.is_empty() {
            // Rejection state changed between restriction and assembly is
            // not possible within one synchronous traversal; defensive only.
            return;
        }
        let items = select_items(search.snapshot, &candidates, search.config.enable_bundling);
        let item_ids = items
            .iter()
            .filter_map(|&ix| search.snapshot.item_id(ix).cloned())
            .collect();
        let from = match search.snapshot.wallet_id(u) {
            Some(id) => id.clone(),
            None => return,
        };
        let to = match search.snapshot.wallet_id(v) {
            Some(id) => id.clone(),
            None => return,
        };
        steps.push(TradeStep { from, to, items: item_ids });
        edge_items.push(items);
    }

    let canonical_id: CanonicalId = tl_canonical::canonicalize(&steps);
    if !search.dedup.probe_and_insert(&canonical_id) {
        search.result.duplicates_suppressed += 1;
        return;
    }

    let breakdown =
        score_cycle(search.snapshot, &steps, &edge_items, &search.config.weights, search.config.max_depth);
    let trade_loop = TradeLoop::new(canonical_id, steps, breakdown.composite);
    search.result.loops.push(trade_loop);
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_common::{TenantId, WalletId};
    use tl_graph_store::GraphStore;

    fn w(i: &str) -> WalletId {
        WalletId::from(i)
    }

    fn basic_config() -> EnumConfig {
        EnumConfig::default()
    }

    #[test]
    fn two_party_swap_is_found_once() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"a1".into()).unwrap();

        let snap = store.snapshot();
        let members: Vec<WalletIx> = snap.all_wallets().collect();
        let dedup = DedupGate::new(1000, 0.001);
        let cancel = CancellationCell::new();

        let result = enumerate_community(&snap, &members, &basic_config(), &dedup, &cancel);
        assert_eq!(result.loops.len(), 1);
        assert_eq!(result.loops[0].participants, 2);
    }

    #[test]
    fn three_party_cycle_is_found() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_owned(&w("C"), &"c1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"c1".into()).unwrap();
        store.add_want(&w("C"), &"a1".into()).unwrap();

        let snap = store.snapshot();
        let members: Vec<WalletIx> = snap.all_wallets().collect();
        let dedup = DedupGate::new(1000, 0.001);
        let cancel = CancellationCell::new();

        let result = enumerate_community(&snap, &members, &basic_config(), &dedup, &cancel);
        assert_eq!(result.loops.len(), 1);
        assert_eq!(result.loops[0].participants, 3);
    }

    #[test]
    fn rejected_peer_suppresses_the_cycle() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"a1".into()).unwrap();
        store.reject(&w("A"), tl_graph_store::RejectionTarget::Peer(w("B"))).unwrap();

        let snap = store.snapshot();
        let members: Vec<WalletIx> = snap.all_wallets().collect();
        let dedup = DedupGate::new(1000, 0.001);
        let cancel = CancellationCell::new();

        let result = enumerate_community(&snap, &members, &basic_config(), &dedup, &cancel);
        assert!(result.loops.is_empty());
    }

    #[test]
    fn max_cycles_per_scc_truncates() {
        let store = GraphStore::new(TenantId::from("t"), None);
        let n = 8;
        for i in 0..n {
            store.add_owned(&w(&format!("w{i}")), &format!("item{i}").into()).unwrap();
        }
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    store.add_want(&w(&format!("w{i}")), &format!("item{j}").into()).unwrap();
                }
            }
        }

        let snap = store.snapshot();
        let members: Vec<WalletIx> = snap.all_wallets().collect();
        let dedup = DedupGate::new(100_000, 0.001);
        let cancel = CancellationCell::new();
        let mut config = basic_config();
        config.max_cycles_per_scc = 5;

        let result = enumerate_community(&snap, &members, &config, &dedup, &cancel);
        assert!(result.truncated);
        assert_eq!(result.loops.len(), 5);
    }

    #[test]
    fn cancellation_stops_the_search() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&w("A"), &"a1".into()).unwrap();
        store.add_owned(&w("B"), &"b1".into()).unwrap();
        store.add_want(&w("A"), &"b1".into()).unwrap();
        store.add_want(&w("B"), &"a1".into()).unwrap();

        let snap = store.snapshot();
        let members: Vec<WalletIx> = snap.all_wallets().collect();
        let dedup = DedupGate::new(1000, 0.001);
        let cancel = CancellationCell::new();
        cancel.cancel();

        let result = enumerate_community(&snap, &members, &basic_config(), &dedup, &cancel);
        assert!(result.timed_out);
        assert!(result.loops.is_empty());
    }
}
