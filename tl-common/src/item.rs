//! Item record

use serde::{Deserialize, Serialize};

use crate::ids::WalletIx;

/// Where an item's `estimated_value` came from
///
/// Per the Open Question in the spec's design notes: when a value is
/// missing, fairness scoring falls back to equal weighting and
/// value-efficiency is skipped, flagged by the absence of a `ValueEstimate`
/// rather than by a sentinel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueProvenance {
    /// Sourced from a pricing oracle collaborator
    Oracle,
    /// Derived heuristically (e.g. floor price, rarity rank) in absence of
    /// an oracle quote
    Heuristic,
}

/// A point-in-time value estimate for an item, with provenance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueEstimate {
    /// The estimated value, in the tenant's configured unit of account
    pub value: f64,
    /// Where this estimate came from
    pub provenance: ValueProvenance,
}

/// A uniquely-owned asset
///
/// I1: at any instant exactly one wallet lists this item in `owned`, and
/// `owner` names that wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The wallet that currently owns this item
    pub owner: WalletIx,
    /// The collection this item belongs to, if any
    pub collection: Option<String>,
    /// The item's estimated value, if known
    pub estimated_value: Option<ValueEstimate>,
}

impl Item {
    /// Create a new item owned by `owner` with no known value or
    /// collection
    pub fn new(owner: WalletIx) -> Self {
        Self { owner, collection: None, estimated_value: None }
    }
}
