//! The public Graph Store interface (C1)

use std::sync::Arc;

use parking_lot::RwLock;
use tl_common::{
    DeltaEvent, DeltaKind, EngineError, Item, ItemId, RejectionKind, TenantId, ValueEstimate,
    Wallet, WalletId,
};

use crate::inner::GraphInner;
use crate::snapshot::GraphSnapshot;

/// Target of a rejection: either a specific item or a specific peer wallet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectionTarget {
    /// Reject trading this item
    Item(ItemId),
    /// Reject trading with this peer
    Peer(WalletId),
}

impl RejectionTarget {
    /// The kind this target corresponds to
    pub fn kind(&self) -> RejectionKind {
        match self {
            RejectionTarget::Item(_) => RejectionKind::Item,
            RejectionTarget::Peer(_) => RejectionKind::Peer,
        }
    }
}

/// Per-tenant store of wallets, items, and wants, enforcing I1-I3
///
/// Cheap to clone: internally an `Arc` around a reader/writer lock. Any
/// number of readers (`snapshot`) may proceed concurrently with each
/// other; writers are serialized and upgrade atomically via
/// copy-on-write (the inner value is only cloned when a snapshot is
/// outstanding).
#[derive(Clone)]
pub struct GraphStore {
    tenant: TenantId,
    inner: Arc<RwLock<Arc<GraphInner>>>,
    delta_tx: Option<crossbeam::channel::Sender<DeltaEvent>>,
}

impl GraphStore {
    /// Create an empty store for `tenant`, optionally publishing every
    /// mutation as a `DeltaEvent` on `delta_tx`
    pub fn new(tenant: TenantId, delta_tx: Option<crossbeam::channel::Sender<DeltaEvent>>) -> Self {
        Self { tenant, inner: Arc::new(RwLock::new(Arc::new(GraphInner::default()))), delta_tx }
    }

    /// The tenant this store belongs to
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn emit(&self, wallet: WalletId, kind: DeltaKind, seq: tl_common::Seq) {
        if let Some(tx) = &self.delta_tx {
            let _ = tx.send(DeltaEvent { tenant: self.tenant.clone(), wallet, kind, seq });
        }
    }

    /// Mutate the graph in place via copy-on-write: the inner value is
    /// cloned only if a snapshot is currently outstanding
    fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut GraphInner) -> R,
    {
        let mut guard = self.inner.write();
        let inner = Arc::make_mut(&mut guard);
        f(inner)
    }

    /// Idempotent: create an empty wallet record if absent
    pub fn upsert_wallet(&self, id: &WalletId) {
        self.mutate(|g| {
            g.get_or_create_wallet(id);
        });
    }

    /// Add `item` to `wallet`'s owned set
    ///
    /// Fails with `OwnershipConflict` if another wallet already owns the
    /// item. Creates the item if it does not yet exist. Normalizes I3 by
    /// dropping the item from the new owner's `wanted` set.
    pub fn add_owned(&self, wallet: &WalletId, item: &ItemId) -> Result<(), EngineError> {
        let seq = self.mutate(|g| -> Result<tl_common::Seq, EngineError> {
            let wallet_ix = g.get_or_create_wallet(wallet);

            if let Some(existing_ix) = g.item_ix(item) {
                let current_owner = g.item(existing_ix).map(|i| i.owner);
                match current_owner {
                    Some(owner) if owner != wallet_ix => {
                        let owner_id = g.wallet_id(owner).cloned().unwrap_or_else(|| wallet.clone());
                        return Err(EngineError::OwnershipConflict {
                            item: item.clone(),
                            current_owner: owner_id,
                        });
                    }
                    _ => {}
                }
                if let Some(w) = g.wallet_mut(wallet_ix) {
                    w.owned.insert(existing_ix);
                    w.normalize_owned_wanted_overlap();
                }
            } else {
                let new_ix = g.create_item(item, wallet_ix);
                if let Some(w) = g.wallet_mut(wallet_ix) {
                    w.owned.insert(new_ix);
                    w.normalize_owned_wanted_overlap();
                }
            }

            Ok(g.next_seq())
        })?;

        self.emit(wallet.clone(), DeltaKind::NftAdded { item: item.clone() }, seq);
        Ok(())
    }

    /// Record a value estimate for `item`, overwriting any prior one
    ///
    /// Pure metadata: it does not affect I1-I3 and is not itself a
    /// `DeltaEvent`-worthy mutation.
    pub fn set_item_value(&self, item: &ItemId, value: ValueEstimate) -> Result<(), EngineError> {
        self.mutate(|g| {
            let item_ix = g.item_ix(item).ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
            if let Some(record) = g.item_mut(item_ix) {
                record.estimated_value = Some(value);
            }
            Ok(())
        })
    }

    /// Record the collection `item` belongs to, overwriting any prior one
    pub fn set_item_collection(&self, item: &ItemId, collection: String) -> Result<(), EngineError> {
        self.mutate(|g| {
            let item_ix = g.item_ix(item).ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
            if let Some(record) = g.item_mut(item_ix) {
                record.collection = Some(collection);
            }
            Ok(())
        })
    }

    /// Remove `item` from the graph entirely (I1: an item always has
    /// exactly one owner while it exists, so removal retires it rather
    /// than leaving it ownerless)
    ///
    /// Clears any `wanted` memberships pointing at the item (I2).
    pub fn remove_owned(&self, wallet: &WalletId, item: &ItemId) -> Result<(), EngineError> {
        let seq = self.mutate(|g| -> Result<tl_common::Seq, EngineError> {
            let wallet_ix =
                g.wallet_ix(wallet).ok_or_else(|| EngineError::UnknownWallet(wallet.clone()))?;
            let item_ix =
                g.item_ix(item).ok_or_else(|| EngineError::UnknownItem(item.clone()))?;

            let owner = g.item(item_ix).map(|i| i.owner);
            if owner != Some(wallet_ix) {
                return Err(EngineError::InvariantViolation(format!(
                    "{item} is not owned by {wallet}"
                )));
            }

            if let Some(w) = g.wallet_mut(wallet_ix) {
                w.owned.remove(&item_ix);
            }
            g.clear_wants_for_item(item_ix);
            g.items[item_ix.0 as usize] = None;

            Ok(g.next_seq())
        })?;

        self.emit(wallet.clone(), DeltaKind::NftRemoved { item: item.clone() }, seq);
        Ok(())
    }

    /// Add `item` to `wallet`'s wanted set
    ///
    /// No-op (not an error) if `wallet` already owns `item`, per I3's
    /// normalization rule. Updates both sides of the inverse index
    /// atomically with respect to readers.
    pub fn add_want(&self, wallet: &WalletId, item: &ItemId) -> Result<(), EngineError> {
        let (seq, added) = self.mutate(|g| -> Result<(tl_common::Seq, bool), EngineError> {
            let wallet_ix = g.get_or_create_wallet(wallet);
            let item_ix =
                g.item_ix(item).ok_or_else(|| EngineError::UnknownItem(item.clone()))?;

            let owns_it = g.wallet(wallet_ix).map(|w| w.owned.contains(&item_ix)).unwrap_or(false);
            if owns_it {
                return Ok((g.seq, false));
            }

            if let Some(w) = g.wallet_mut(wallet_ix) {
                w.wanted.insert(item_ix);
            }
            g.wants_index.entry(item_ix).or_default().insert(wallet_ix);

            Ok((g.next_seq(), true))
        })?;

        if added {
            self.emit(wallet.clone(), DeltaKind::WantAdded { item: item.clone() }, seq);
        }
        Ok(())
    }

    /// Remove `item` from `wallet`'s wanted set; idempotent
    pub fn remove_want(&self, wallet: &WalletId, item: &ItemId) -> Result<(), EngineError> {
        let (seq, removed) = self.mutate(|g| -> Result<(tl_common::Seq, bool), EngineError> {
            let wallet_ix =
                g.wallet_ix(wallet).ok_or_else(|| EngineError::UnknownWallet(wallet.clone()))?;
            let Some(item_ix) = g.item_ix(item) else {
                return Ok((g.seq, false));
            };

            let had_it = g.wallet_mut(wallet_ix).map(|w| w.wanted.remove(&item_ix)).unwrap_or(false);
            if had_it {
                if let Some(wanters) = g.wants_index.get_mut(&item_ix) {
                    wanters.remove(&wallet_ix);
                    if wanters.is_empty() {
                        g.wants_index.remove(&item_ix);
                    }
                }
            }

            Ok((g.next_seq(), had_it))
        })?;

        if removed {
            self.emit(wallet.clone(), DeltaKind::WantRemoved { item: item.clone() }, seq);
        }
        Ok(())
    }

    /// Record a rejection for `wallet` against `target`
    ///
    /// A rejection can strand a previously valid loop just as removing an
    /// item or want can, so it is emitted as a `DeltaEvent` too.
    pub fn reject(&self, wallet: &WalletId, target: RejectionTarget) -> Result<(), EngineError> {
        let seq = self.mutate(|g| -> Result<tl_common::Seq, EngineError> {
            let wallet_ix = g.get_or_create_wallet(wallet);
            match &target {
                RejectionTarget::Item(item) => {
                    let item_ix = g.item_ix(item).ok_or_else(|| EngineError::UnknownItem(item.clone()))?;
                    if let Some(w) = g.wallet_mut(wallet_ix) {
                        w.rejected_items.insert(item_ix);
                    }
                }
                RejectionTarget::Peer(peer) => {
                    let peer_ix = g.get_or_create_wallet(peer);
                    if let Some(w) = g.wallet_mut(wallet_ix) {
                        w.rejected_peers.insert(peer_ix);
                    }
                }
            }
            Ok(g.next_seq())
        })?;

        let kind = match &target {
            RejectionTarget::Item(item) => DeltaKind::ItemRejected { item: item.clone() },
            RejectionTarget::Peer(peer) => DeltaKind::PeerRejected { peer: peer.clone() },
        };
        self.emit(wallet.clone(), kind, seq);
        Ok(())
    }

    /// Look up an item's current record
    pub fn get_item(&self, item: &ItemId) -> Option<Item> {
        let guard = self.inner.read();
        let ix = guard.item_ix(item)?;
        guard.item(ix).cloned()
    }

    /// Look up a wallet's current record
    pub fn get_wallet(&self, wallet: &WalletId) -> Option<Wallet> {
        let guard = self.inner.read();
        let ix = guard.wallet_ix(wallet)?;
        guard.wallet(ix).cloned()
    }

    /// Take a cheap, immutable snapshot suitable for read-only traversal
    pub fn snapshot(&self) -> GraphSnapshot {
        let guard = self.inner.read();
        GraphSnapshot { tenant: self.tenant.clone(), inner: Arc::clone(&guard) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn store() -> GraphStore {
        GraphStore::new(TenantId::from("t1"), None)
    }

    #[test]
    fn add_owned_assigns_ownership() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();

        let item = s.get_item(&"item1".into()).unwrap();
        let owner_ix = item.owner;
        let snap = s.snapshot();
        assert_eq!(snap.wallet_id(owner_ix), Some(&"A".into()));
    }

    #[test]
    fn add_owned_conflict_is_rejected() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();
        let err = s.add_owned(&"B".into(), &"item1".into()).unwrap_err();
        assert!(matches!(err, EngineError::OwnershipConflict { .. }));
    }

    #[test]
    fn add_remove_nft_round_trips() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();
        s.remove_owned(&"A".into(), &"item1".into()).unwrap();

        assert!(s.get_item(&"item1".into()).is_none());
    }

    #[test]
    fn want_cannot_target_owned_item() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();
        s.add_want(&"A".into(), &"item1".into()).unwrap();

        let wallet = s.get_wallet(&"A".into()).unwrap();
        assert!(!wallet.wanted.contains(&wallet.owned.iter().next().copied().unwrap()));
    }

    #[test]
    fn add_remove_want_is_idempotent() {
        let s = store();
        s.add_owned(&"B".into(), &"item1".into()).unwrap();
        s.add_want(&"A".into(), &"item1".into()).unwrap();
        s.remove_want(&"A".into(), &"item1".into()).unwrap();

        let wallet = s.get_wallet(&"A".into()).unwrap();
        assert!(wallet.wanted.is_empty());

        // Idempotent: removing again is a no-op, not an error
        s.remove_want(&"A".into(), &"item1".into()).unwrap();
    }

    #[test]
    fn wants_index_stays_consistent_with_wallet_wanted() {
        let s = store();
        s.add_owned(&"B".into(), &"item1".into()).unwrap();
        s.add_want(&"A".into(), &"item1".into()).unwrap();

        let snap = s.snapshot();
        let a_ix = snap.wallet_ix(&"A".into()).unwrap();
        let item_ix = snap.item_ix(&"item1".into()).unwrap();
        assert!(snap.wanted(a_ix).contains(&item_ix));
        assert!(snap.successors(a_ix).contains(&snap.wallet_ix(&"B".into()).unwrap()));
    }

    #[test]
    fn set_item_value_is_visible_through_a_later_snapshot() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();
        s.set_item_value(
            &"item1".into(),
            tl_common::ValueEstimate { value: 4.5, provenance: tl_common::ValueProvenance::Oracle },
        )
        .unwrap();

        let snap = s.snapshot();
        let ix = snap.item_ix(&"item1".into()).unwrap();
        assert_eq!(snap.estimated_value(ix), Some(4.5));
    }

    #[test]
    fn set_item_value_on_unknown_item_fails() {
        let s = store();
        let err = s
            .set_item_value(
                &"ghost".into(),
                tl_common::ValueEstimate { value: 1.0, provenance: tl_common::ValueProvenance::Heuristic },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownItem(_)));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let s = store();
        s.add_owned(&"A".into(), &"item1".into()).unwrap();
        let snap = s.snapshot();

        s.add_owned(&"B".into(), &"item2".into()).unwrap();

        assert!(snap.item_ix(&"item2".into()).is_none());
    }
}
