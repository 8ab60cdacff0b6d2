//! Delta events: a single mutation to a tenant graph with a monotone
//! sequence number

use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, Seq, TenantId, WalletId};

/// The kind of mutation a delta event reports
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaKind {
    /// An item was added to a wallet's `owned` set
    NftAdded {
        /// The item that was added
        item: ItemId,
    },
    /// An item was removed from a wallet's `owned` set
    NftRemoved {
        /// The item that was removed
        item: ItemId,
    },
    /// An item was added to a wallet's `wanted` set
    WantAdded {
        /// The item that was wanted
        item: ItemId,
    },
    /// An item was removed from a wallet's `wanted` set
    WantRemoved {
        /// The item that was no longer wanted
        item: ItemId,
    },
    /// A wallet refused to trade a specific item
    ItemRejected {
        /// The item that was rejected
        item: ItemId,
    },
    /// A wallet refused to trade with a specific peer
    PeerRejected {
        /// The peer that was rejected
        peer: WalletId,
    },
}

/// A single observable mutation to a tenant's graph, carrying the monotone
/// sequence number the Delta Engine uses to order and coalesce events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    /// The tenant whose graph changed
    pub tenant: TenantId,
    /// The wallet the mutation was applied to
    pub wallet: WalletId,
    /// What changed
    pub kind: DeltaKind,
    /// Monotone sequence number, assigned by the graph store
    pub seq: Seq,
}
