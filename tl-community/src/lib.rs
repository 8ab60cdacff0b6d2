//! Modularity-based community partitioning for oversized SCCs (C4)
//!
//! Below `max_community_size` an SCC is a single community. Above it, a
//! single-level Louvain-style pass greedily moves wallets between
//! communities to maximize modularity on the want-graph treated as
//! undirected and unweighted-by-count (an edge in either direction
//! contributes one unit of weight). The want-graph's directedness and
//! per-edge item semantics live one layer up in the cycle enumerator;
//! partitioning only needs topology. Partitioning is explicitly
//! approximate, per spec: it caps enumeration cost, it does not claim to
//! find the true modularity optimum.
#![deny(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tl_common::WalletIx;
use tl_graph_store::GraphSnapshot;

/// Upper bound on how many cross-boundary bridge nodes a single
/// community's enumeration set is widened with when
/// `enable_cross_community` is on; keeps the widened set from
/// re-inflating back past `max_community_size`.
const MAX_BRIDGE_NODES_PER_COMMUNITY: usize = 50;

/// Maximum number of Louvain passes before giving up on convergence
const MAX_PASSES: usize = 10;

/// Identifies one community within a single partitioning run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommunityId(pub u32);

/// One community: its core members plus, when cross-community bridging is
/// enabled, the bridge nodes promoted in from neighboring communities
#[derive(Clone, Debug, Default)]
pub struct Community {
    /// Wallets that belong to this community
    pub members: Vec<WalletIx>,
    /// Wallets from other communities promoted in to let cycles cross
    /// the partition boundary; empty unless cross-community bridging is
    /// enabled
    pub bridge_nodes: Vec<WalletIx>,
}

impl Community {
    /// All wallets this community's enumerator should consider: members
    /// plus any promoted bridge nodes
    pub fn enumeration_set(&self) -> Vec<WalletIx> {
        let mut all = self.members.clone();
        all.extend(self.bridge_nodes.iter().copied());
        all
    }
}

/// Partition an SCC into communities
pub fn partition(
    snapshot: &GraphSnapshot,
    scc: &[WalletIx],
    max_community_size: usize,
    enable_cross_community: bool,
) -> BTreeMap<CommunityId, Community> {
    if scc.len() <= max_community_size {
        let mut members = scc.to_vec();
        members.sort_by_key(|w| w.0);
        let mut out = BTreeMap::new();
        out.insert(CommunityId(0), Community { members, bridge_nodes: Vec::new() });
        return out;
    }

    let membership = louvain_pass(snapshot, scc);
    let mut communities = enforce_size_cap(membership, max_community_size);

    if enable_cross_community {
        attach_bridge_nodes(snapshot, scc, &mut communities);
    }

    communities
}

/// Undirected, unit-weighted adjacency derived from the want-graph,
/// restricted to `scc`
fn build_undirected_weights(
    snapshot: &GraphSnapshot,
    scc: &[WalletIx],
) -> HashMap<WalletIx, HashMap<WalletIx, f64>> {
    let members: BTreeSet<WalletIx> = scc.iter().copied().collect();
    let mut weights: HashMap<WalletIx, HashMap<WalletIx, f64>> = HashMap::new();

    for &u in scc {
        for v in snapshot.successors(u) {
            if !members.contains(&v) || v == u {
                continue;
            }
            *weights.entry(u).or_default().entry(v).or_insert(0.0) += 1.0;
            *weights.entry(v).or_default().entry(u).or_insert(0.0) += 1.0;
        }
    }

    weights
}

fn louvain_pass(snapshot: &GraphSnapshot, scc: &[WalletIx]) -> HashMap<WalletIx, u32> {
    let weights = build_undirected_weights(snapshot, scc);

    let degree: HashMap<WalletIx, f64> =
        weights.iter().map(|(&v, nbrs)| (v, nbrs.values().sum())).collect();
    let total_weight: f64 = degree.values().sum::<f64>() / 2.0;

    let mut community: HashMap<WalletIx, u32> =
        scc.iter().enumerate().map(|(i, &v)| (v, i as u32)).collect();

    if total_weight <= 0.0 {
        return community;
    }

    let mut sorted_nodes = scc.to_vec();
    sorted_nodes.sort_by_key(|w| w.0);

    for _pass in 0..MAX_PASSES {
        let mut moved = false;

        for &v in &sorted_nodes {
            let current = community[&v];
            let deg_v = *degree.get(&v).unwrap_or(&0.0);
            let empty = HashMap::new();
            let neighbors = weights.get(&v).unwrap_or(&empty);

            // Sum of degrees of every community a neighbor belongs to, and
            // edge weight from v into each candidate community
            let mut candidate_communities: BTreeSet<u32> = neighbors
                .keys()
                .map(|n| community[n])
                .collect();
            candidate_communities.insert(current);

            let mut best_community = current;
            let mut best_gain = f64::MIN;

            for &cand in &candidate_communities {
                let tot_c: f64 = sorted_nodes
                    .iter()
                    .filter(|&&n| n != v && community[&n] == cand)
                    .map(|n| *degree.get(n).unwrap_or(&0.0))
                    .sum();
                let k_v_in: f64 =
                    neighbors.iter().filter(|(n, _)| community[n] == cand).map(|(_, w)| *w).sum();

                let gain = k_v_in - (tot_c * deg_v) / (2.0 * total_weight);
                if gain > best_gain || (gain == best_gain && cand < best_community) {
                    best_gain = gain;
                    best_community = cand;
                }
            }

            if best_community != current {
                community.insert(v, best_community);
                moved = true;
            }
        }

        if !moved {
            break;
        }
    }

    community
}

/// Split any community whose size exceeds `max_community_size` into
/// deterministic sorted chunks, guaranteeing the output respects the cap
fn enforce_size_cap(
    membership: HashMap<WalletIx, u32>,
    max_community_size: usize,
) -> BTreeMap<CommunityId, Community> {
    let mut grouped: BTreeMap<u32, Vec<WalletIx>> = BTreeMap::new();
    for (wallet, comm) in membership {
        grouped.entry(comm).or_default().push(wallet);
    }

    let mut out = BTreeMap::new();
    let mut next_id = 0u32;
    for (_, mut members) in grouped {
        members.sort_by_key(|w| w.0);
        for chunk in members.chunks(max_community_size.max(1)) {
            out.insert(
                CommunityId(next_id),
                Community { members: chunk.to_vec(), bridge_nodes: Vec::new() },
            );
            next_id += 1;
        }
    }
    out
}

/// For each community, promote in the nodes on the other side of any
/// cross-community edge, capped at `MAX_BRIDGE_NODES_PER_COMMUNITY`
fn attach_bridge_nodes(
    snapshot: &GraphSnapshot,
    scc: &[WalletIx],
    communities: &mut BTreeMap<CommunityId, Community>,
) {
    let mut owner: HashMap<WalletIx, CommunityId> = HashMap::new();
    for (&id, community) in communities.iter() {
        for &m in &community.members {
            owner.insert(m, id);
        }
    }

    let mut bridges: HashMap<CommunityId, BTreeSet<WalletIx>> = HashMap::new();
    for &u in scc {
        let Some(&cu) = owner.get(&u) else { continue };
        for v in snapshot.successors(u) {
            let Some(&cv) = owner.get(&v) else { continue };
            if cu != cv {
                bridges.entry(cu).or_default().insert(v);
                bridges.entry(cv).or_default().insert(u);
            }
        }
    }

    for (id, community) in communities.iter_mut() {
        if let Some(set) = bridges.get(id) {
            community.bridge_nodes =
                set.iter().take(MAX_BRIDGE_NODES_PER_COMMUNITY).copied().collect();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_common::{TenantId, WalletId};
    use tl_graph_store::GraphStore;

    fn w(i: &str) -> WalletId {
        WalletId::from(i)
    }

    #[test]
    fn below_threshold_is_a_single_community() {
        let store = GraphStore::new(TenantId::from("t"), None);
        for (owner, wants) in [("A", "b1"), ("B", "c1"), ("C", "a1")] {
            store.add_owned(&w(owner), &format!("{owner}1").into()).unwrap();
            let _ = wants;
        }
        store.add_want(&w("A"), &"B1".into()).unwrap_or(());

        let snap = store.snapshot();
        let scc: Vec<WalletIx> = snap.all_wallets().collect();
        let out = partition(&snap, &scc, 500, false);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn oversized_groups_are_split_to_respect_the_cap() {
        let store = GraphStore::new(TenantId::from("t"), None);
        // Build a ring of 10 wallets, each wanting the next one's item
        let n = 10;
        for i in 0..n {
            store.add_owned(&w(&format!("w{i}")), &format!("item{i}").into()).unwrap();
        }
        for i in 0..n {
            let next = (i + 1) % n;
            store.add_want(&w(&format!("w{i}")), &format!("item{next}").into()).unwrap();
        }

        let snap = store.snapshot();
        let scc: Vec<WalletIx> = snap.all_wallets().collect();
        let out = partition(&snap, &scc, 3, false);

        for community in out.values() {
            assert!(community.members.len() <= 3);
        }
        let total: usize = out.values().map(|c| c.members.len()).sum();
        assert_eq!(total, n);
    }

    #[test]
    fn cross_community_bridging_adds_boundary_nodes() {
        let store = GraphStore::new(TenantId::from("t"), None);
        let n = 10;
        for i in 0..n {
            store.add_owned(&w(&format!("w{i}")), &format!("item{i}").into()).unwrap();
        }
        for i in 0..n {
            let next = (i + 1) % n;
            store.add_want(&w(&format!("w{i}")), &format!("item{next}").into()).unwrap();
        }

        let snap = store.snapshot();
        let scc: Vec<WalletIx> = snap.all_wallets().collect();
        let out = partition(&snap, &scc, 3, true);

        let has_bridges = out.values().any(|c| !c.bridge_nodes.is_empty());
        assert!(has_bridges, "a ring split into chunks must have boundary edges");
    }
}
