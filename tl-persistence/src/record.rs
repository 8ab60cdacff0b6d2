//! On-disk record shapes, independent of backend

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tl_common::{CanonicalId, ItemId, TradeLoop, WalletId};

/// One wallet's persisted state: identity, ownership, wants, and
/// rejections
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    /// The wallet's opaque id
    pub id: WalletId,
    /// Items this wallet owns
    pub owned: Vec<ItemId>,
    /// Items this wallet wants
    pub wanted: Vec<ItemId>,
    /// Items this wallet refuses to trade
    pub rejected_items: Vec<ItemId>,
    /// Peers this wallet refuses to trade with
    pub rejected_peers: Vec<WalletId>,
}

/// A tenant's graph snapshot as a flat record stream
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Every wallet known to the tenant, in arbitrary order
    pub wallets: Vec<WalletRecord>,
}

/// A tenant's loop cache, keyed by canonical id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopCacheRecord {
    /// Every loop currently tracked for the tenant
    pub loops: HashMap<CanonicalId, TradeLoop>,
}
