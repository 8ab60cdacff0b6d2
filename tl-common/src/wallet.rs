//! Wallet record
//!
//! Owned and wanted are disjoint by convention (I3): a wallet never wants
//! an item it already owns. Violations are normalized at the boundary by
//! removing the item from `wanted`, never by rejecting the mutation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{ItemIx, Timestamp, WalletIx};

/// The kind of peer a rejection targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    /// Reject trading a specific item, regardless of counterparty
    Item,
    /// Reject trading with a specific peer wallet, regardless of item
    Peer,
}

/// A participant wallet: owns a set of items, wants another set, and may
/// carry rejections that suppress otherwise-valid loops before emission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// This wallet's compact index within the tenant arena
    pub ix: WalletIx,
    /// Items this wallet currently owns
    pub owned: BTreeSet<ItemIx>,
    /// Items this wallet wants to acquire
    pub wanted: BTreeSet<ItemIx>,
    /// Items this wallet refuses to trade regardless of counterparty
    pub rejected_items: BTreeSet<ItemIx>,
    /// Peers this wallet refuses to trade with regardless of item
    pub rejected_peers: BTreeSet<WalletIx>,
    /// When this wallet's record was last mutated
    pub last_updated: Timestamp,
}

impl Wallet {
    /// Create an empty wallet record at the given index
    pub fn new(ix: WalletIx) -> Self {
        Self {
            ix,
            owned: BTreeSet::new(),
            wanted: BTreeSet::new(),
            rejected_items: BTreeSet::new(),
            rejected_peers: BTreeSet::new(),
            last_updated: Timestamp::now(),
        }
    }

    /// Normalize I3: an item a wallet now owns can no longer be wanted by
    /// the same wallet
    pub fn normalize_owned_wanted_overlap(&mut self) {
        self.wanted.retain(|item| !self.owned.contains(item));
    }
}
