//! A cheap, immutable, read-only view over a tenant's graph
//!
//! Snapshots are cheap because the store never mutates the `Arc<GraphInner>`
//! a snapshot points to; writers instead copy-on-write (`Arc::make_mut`)
//! into a fresh inner value when a snapshot is outstanding.

use std::collections::BTreeSet;
use std::sync::Arc;

use tl_common::{ItemId, ItemIx, Seq, TenantId, WalletId, WalletIx};

use crate::inner::GraphInner;

/// An immutable, point-in-time view of one tenant's graph
#[derive(Clone)]
pub struct GraphSnapshot {
    pub(crate) tenant: TenantId,
    pub(crate) inner: Arc<GraphInner>,
}

impl GraphSnapshot {
    /// The tenant this snapshot belongs to
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// The sequence number as of this snapshot
    pub fn seq(&self) -> Seq {
        self.inner.seq
    }

    /// Resolve a wallet's opaque id to its compact index
    pub fn wallet_ix(&self, id: &WalletId) -> Option<WalletIx> {
        self.inner.wallet_ix(id)
    }

    /// Resolve a compact wallet index back to its opaque id
    pub fn wallet_id(&self, ix: WalletIx) -> Option<&WalletId> {
        self.inner.wallet_id(ix)
    }

    /// Resolve an item's opaque id to its compact index
    pub fn item_ix(&self, id: &ItemId) -> Option<ItemIx> {
        self.inner.item_ix(id)
    }

    /// Resolve a compact item index back to its opaque id
    pub fn item_id(&self, ix: ItemIx) -> Option<&ItemId> {
        self.inner.item_id(ix)
    }

    /// All wallet indices currently present in the graph
    pub fn all_wallets(&self) -> impl Iterator<Item = WalletIx> + '_ {
        (0..self.inner.wallets.len()).map(|i| WalletIx(i as u32))
    }

    /// The items a wallet owns
    pub fn owned(&self, wallet: WalletIx) -> BTreeSet<ItemIx> {
        self.inner.wallet(wallet).map(|w| w.owned.clone()).unwrap_or_default()
    }

    /// The items a wallet wants
    pub fn wanted(&self, wallet: WalletIx) -> BTreeSet<ItemIx> {
        self.inner.wallet(wallet).map(|w| w.wanted.clone()).unwrap_or_default()
    }

    /// Whether `wallet` has rejected `peer` as a counterparty
    pub fn has_rejected_peer(&self, wallet: WalletIx, peer: WalletIx) -> bool {
        self.inner.wallet(wallet).map(|w| w.rejected_peers.contains(&peer)).unwrap_or(false)
    }

    /// Whether `wallet` has rejected trading `item`
    pub fn has_rejected_item(&self, wallet: WalletIx, item: ItemIx) -> bool {
        self.inner.wallet(wallet).map(|w| w.rejected_items.contains(&item)).unwrap_or(false)
    }

    /// The peers a wallet has rejected as counterparties
    pub fn rejected_peers(&self, wallet: WalletIx) -> BTreeSet<WalletIx> {
        self.inner.wallet(wallet).map(|w| w.rejected_peers.clone()).unwrap_or_default()
    }

    /// The items a wallet refuses to trade
    pub fn rejected_items(&self, wallet: WalletIx) -> BTreeSet<ItemIx> {
        self.inner.wallet(wallet).map(|w| w.rejected_items.clone()).unwrap_or_default()
    }

    /// The current owner of an item, if the item still exists
    pub fn owner_of(&self, item: ItemIx) -> Option<WalletIx> {
        self.inner.item(item).map(|i| i.owner)
    }

    /// Estimated value of an item, if known
    pub fn estimated_value(&self, item: ItemIx) -> Option<f64> {
        self.inner.item(item).and_then(|i| i.estimated_value).map(|v| v.value)
    }

    /// Directed want-graph successors of `wallet`: every wallet `v` such
    /// that `wallet` wants an item owned by `v`
    ///
    /// This is the `u -> v iff u wants an item owned by v` relation the
    /// SCC finder and cycle enumerator operate on.
    pub fn successors(&self, wallet: WalletIx) -> BTreeSet<WalletIx> {
        self.wanted(wallet)
            .into_iter()
            .filter_map(|item| self.owner_of(item))
            .filter(|&owner| owner != wallet)
            .collect()
    }

    /// The non-empty subset of `owned(u) ∩ wanted(v)` for a candidate edge
    /// `u -> v`, excluding anything `u` or `v` has rejected
    pub fn tradable_items(&self, u: WalletIx, v: WalletIx) -> Vec<ItemIx> {
        let owned_u = self.owned(u);
        let wanted_v = self.wanted(v);
        owned_u
            .intersection(&wanted_v)
            .copied()
            .filter(|item| !self.has_rejected_item(u, *item) && !self.has_rejected_item(v, *item))
            .collect()
    }
}
