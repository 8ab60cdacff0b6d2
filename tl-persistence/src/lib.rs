//! Persistence extension point (A3)
//!
//! The core is durable only for the lifetime of the process; anything
//! beyond that is delegated to a `PersistenceBackend` collaborator. This
//! crate defines that seam and ships two reference implementations:
//! `InMemoryBackend` for tests and persistence-disabled deployments, and
//! `FileBackend` exercising the exact on-disk layout described for the
//! persisted state.
#![deny(missing_docs)]

mod backend;
mod file;
mod memory;
mod record;

pub use backend::{PersistenceBackend, PersistenceError};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use record::{GraphRecord, LoopCacheRecord, WalletRecord};
