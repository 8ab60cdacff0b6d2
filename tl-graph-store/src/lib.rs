//! The per-tenant graph store (C1)
//!
//! Owns all wallet and item records exclusively; cycle discovery never
//! mutates, it only reads consistent snapshots.
#![deny(missing_docs)]

mod inner;
mod snapshot;
mod store;

pub use snapshot::GraphSnapshot;
pub use store::{GraphStore, RejectionTarget};
