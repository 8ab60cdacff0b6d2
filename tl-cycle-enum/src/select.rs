//! Item-selection policy for a closed edge `u -> v`

use tl_common::ItemIx;
use tl_graph_store::GraphSnapshot;

/// Choose the item(s) to move across edge `u -> v`
///
/// `candidates` is `tradable_items(u, v)`, already filtered of rejections
/// and guaranteed non-empty by the caller. Default policy (bundling
/// disabled) picks a single item: the highest known value, falling back to
/// the most-wanted item, falling back to the lowest id, so selection is
/// deterministic even with no value data at all. Bundling mode takes the
/// whole candidate set.
pub fn select_items(
    snapshot: &GraphSnapshot,
    candidates: &[ItemIx],
    enable_bundling: bool,
) -> Vec<ItemIx> {
    if enable_bundling {
        let mut items = candidates.to_vec();
        items.sort_by_key(|i| i.0);
        return items;
    }

    let mut ranked = candidates.to_vec();
    ranked.sort_by(|&a, &b| {
        let va = snapshot.estimated_value(a);
        let vb = snapshot.estimated_value(b);
        match (va, vb) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => {
                let da = wanter_count(snapshot, a);
                let db = wanter_count(snapshot, b);
                db.cmp(&da).then(a.0.cmp(&b.0))
            }
        }
    });

    vec![ranked[0]]
}

fn wanter_count(snapshot: &GraphSnapshot, item: ItemIx) -> usize {
    snapshot.all_wallets().filter(|&w| snapshot.wanted(w).contains(&item)).count()
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_common::{TenantId, WalletId};
    use tl_graph_store::GraphStore;

    #[test]
    fn bundling_returns_every_candidate_sorted() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&WalletId::from("A"), &"z".into()).unwrap();
        store.add_owned(&WalletId::from("A"), &"a".into()).unwrap();
        let snap = store.snapshot();

        let candidates = vec![snap.item_ix(&"z".into()).unwrap(), snap.item_ix(&"a".into()).unwrap()];
        let selected = select_items(&snap, &candidates, true);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].0 <= selected[1].0);
    }

    #[test]
    fn default_policy_picks_one_item_deterministically() {
        let store = GraphStore::new(TenantId::from("t"), None);
        store.add_owned(&WalletId::from("A"), &"a".into()).unwrap();
        store.add_owned(&WalletId::from("A"), &"b".into()).unwrap();
        let snap = store.snapshot();

        let candidates = vec![snap.item_ix(&"a".into()).unwrap(), snap.item_ix(&"b".into()).unwrap()];
        let selected = select_items(&snap, &candidates, false);
        assert_eq!(selected.len(), 1);
    }
}
