//! The engine-wide error taxonomy
//!
//! Every user-visible failure of a discovery request is either (a) success
//! with metadata flags exposing partial results, or (b) exactly one of the
//! variants below. Component-local error types convert into this one at
//! their crate boundary via `From` impls, mirroring the teacher's
//! `From<ArbitrumClientConfigError> for ArbitrumClientError` pattern.

use thiserror::Error;

use crate::ids::{ItemId, TenantId, WalletId};

/// The engine's top-level error type
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// `add_owned` was called for an item another wallet already owns
    #[error("item {item} is already owned by {current_owner}")]
    OwnershipConflict {
        /// The item in conflict
        item: ItemId,
        /// The wallet that currently owns it
        current_owner: WalletId,
    },

    /// An I1-I3 invariant was detected broken mid-traversal; fatal for the
    /// request, triggers a recovery sweep on the graph store
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A lifecycle transition was requested that the state machine does
    /// not permit
    #[error("illegal lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// The loop's current state, as text
        from: String,
        /// The requested next state, as text
        to: String,
    },

    /// No tenant graph exists for the given id
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),

    /// No wallet exists with the given id in the tenant's graph
    #[error("unknown wallet: {0}")]
    UnknownWallet(WalletId),

    /// No item exists with the given id in the tenant's graph
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    /// A discovery request exhausted its timeout, cycle cap, or community
    /// cap; recovered locally and flagged in `DiscoveryMetadata`, never
    /// surfaced as a hard failure on its own
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),

    /// A snapshot's version drifted under a long read; retried once with a
    /// fresh snapshot, then surfaced if it recurs
    #[error("snapshot inconsistency: {0}")]
    SnapshotInconsistency(String),

    /// No loop exists with the given canonical id
    #[error("unknown loop: {0}")]
    UnknownLoop(String),
}
