//! The arena-backed graph representation
//!
//! All cross-references (ownership, wants, rejections) are compact integer
//! indices into `wallets`/`items`, never pointers, per the Design Notes'
//! "Cyclic references" guidance: the want-graph is cyclic in the integer
//! domain, never in the memory representation.

use std::collections::{BTreeSet, HashMap};

use tl_common::{Item, ItemId, ItemIx, Seq, Wallet, WalletId, WalletIx};

/// The full mutable state of one tenant's graph
#[derive(Clone, Debug, Default)]
pub(crate) struct GraphInner {
    pub(crate) wallets: Vec<Wallet>,
    pub(crate) wallet_ids: Vec<WalletId>,
    pub(crate) wallet_index: HashMap<WalletId, WalletIx>,

    /// `None` marks a tombstoned item (removed from the graph entirely)
    pub(crate) items: Vec<Option<Item>>,
    pub(crate) item_ids: Vec<ItemId>,
    pub(crate) item_index: HashMap<ItemId, ItemIx>,

    /// Inverse index of `wallet.wanted`, kept strictly consistent (I2)
    pub(crate) wants_index: HashMap<ItemIx, BTreeSet<WalletIx>>,

    pub(crate) seq: Seq,
}

impl GraphInner {
    pub(crate) fn next_seq(&mut self) -> Seq {
        let seq = self.seq;
        self.seq = self.seq.next();
        seq
    }

    pub(crate) fn get_or_create_wallet(&mut self, id: &WalletId) -> WalletIx {
        if let Some(ix) = self.wallet_index.get(id) {
            return *ix;
        }
        let ix = WalletIx(self.wallets.len() as u32);
        self.wallets.push(Wallet::new(ix));
        self.wallet_ids.push(id.clone());
        self.wallet_index.insert(id.clone(), ix);
        ix
    }

    pub(crate) fn wallet_ix(&self, id: &WalletId) -> Option<WalletIx> {
        self.wallet_index.get(id).copied()
    }

    pub(crate) fn item_ix(&self, id: &ItemId) -> Option<ItemIx> {
        self.item_index.get(id).copied()
    }

    pub(crate) fn wallet(&self, ix: WalletIx) -> Option<&Wallet> {
        self.wallets.get(ix.0 as usize)
    }

    pub(crate) fn wallet_mut(&mut self, ix: WalletIx) -> Option<&mut Wallet> {
        self.wallets.get_mut(ix.0 as usize)
    }

    pub(crate) fn item(&self, ix: ItemIx) -> Option<&Item> {
        self.items.get(ix.0 as usize).and_then(|o| o.as_ref())
    }

    pub(crate) fn item_mut(&mut self, ix: ItemIx) -> Option<&mut Item> {
        self.items.get_mut(ix.0 as usize).and_then(|o| o.as_mut())
    }

    pub(crate) fn wallet_id(&self, ix: WalletIx) -> Option<&WalletId> {
        self.wallet_ids.get(ix.0 as usize)
    }

    pub(crate) fn item_id(&self, ix: ItemIx) -> Option<&ItemId> {
        self.item_ids.get(ix.0 as usize)
    }

    /// Create a fresh item slot, owned by `owner`, tracked under `id`
    pub(crate) fn create_item(&mut self, id: &ItemId, owner: WalletIx) -> ItemIx {
        let ix = ItemIx(self.items.len() as u32);
        self.items.push(Some(Item::new(owner)));
        self.item_ids.push(id.clone());
        self.item_index.insert(id.clone(), ix);
        ix
    }

    /// Remove an item's want-index entries and wanted-set memberships
    /// entirely (I2): once an item ceases to exist, nothing may want it.
    pub(crate) fn clear_wants_for_item(&mut self, item_ix: ItemIx) {
        if let Some(wanters) = self.wants_index.remove(&item_ix) {
            for wanter in wanters {
                if let Some(w) = self.wallet_mut(wanter) {
                    w.wanted.remove(&item_ix);
                }
            }
        }
    }
}
