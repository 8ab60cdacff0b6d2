//! Identifier newtypes
//!
//! The public API deals in opaque string ids (`WalletId`, `ItemId`,
//! `TenantId`); internally the graph store resolves these to compact
//! integer indices (`WalletIx`, `ItemIx`) assigned from an arena at ingest.
//! No reference inside a tenant graph is ever a pointer — all of them are
//! indices, so the naturally-cyclic want-graph has no corresponding cycle
//! in the memory representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a tenant
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for a wallet, as seen by callers of the public API
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletId(pub String);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for an item, as seen by callers of the public API
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Compact integer index for a wallet, stable only within one tenant's
/// arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletIx(pub u32);

/// Compact integer index for an item, stable only within one tenant's
/// arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemIx(pub u32);

/// Monotone per-tenant sequence number, assigned by the graph store on
/// every mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Seq(pub u64);

impl Seq {
    /// The sequence number preceding the first mutation
    pub const ZERO: Seq = Seq(0);

    /// The next sequence number after this one
    pub fn next(self) -> Seq {
        Seq(self.0 + 1)
    }
}

/// Milliseconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The current time, per `tl_util::now_millis`
    pub fn now() -> Self {
        Self(tl_util::now_millis())
    }

    /// This timestamp plus the given number of milliseconds
    pub fn plus_millis(self, millis: u64) -> Self {
        Self(self.0 + millis)
    }

    /// Whether this timestamp is strictly before `other`
    pub fn is_before(self, other: Timestamp) -> bool {
        self.0 < other.0
    }
}

/// A deterministic key identifying a cycle independent of rotation or
/// direction, produced by the canonicalizer
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalId(pub String);

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
