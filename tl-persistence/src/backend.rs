//! The persistence extension point
//!
//! The core never ships a concrete database integration; `PersistenceBackend`
//! is the seam a deployment plugs a real store into. `InMemoryBackend` and
//! `FileBackend` are reference implementations exercising the interface,
//! not production collaborators.

use tl_common::TenantId;

use crate::record::{GraphRecord, LoopCacheRecord};

/// Errors a persistence backend can surface
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Underlying filesystem operation failed
    #[error("io error on {path}: {source}")]
    Io {
        /// Path involved in the failing operation
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
    /// Stored bytes did not match the expected framing (magic/version) or
    /// failed to decode
    #[error("corrupt record for tenant {tenant}: {reason}")]
    Corrupt {
        /// Tenant whose record failed to decode
        tenant: TenantId,
        /// Human-readable reason
        reason: String,
    },
}

/// The persistence extension point: save and load a tenant's graph
/// snapshot and loop cache
pub trait PersistenceBackend: Send + Sync {
    /// Persist `record` as the tenant's current graph snapshot
    fn save_graph(&self, tenant: &TenantId, record: &GraphRecord) -> Result<(), PersistenceError>;

    /// Load the tenant's last-persisted graph snapshot, if any
    fn load_graph(&self, tenant: &TenantId) -> Result<Option<GraphRecord>, PersistenceError>;

    /// Persist `record` as the tenant's current loop cache
    fn save_loops(
        &self,
        tenant: &TenantId,
        record: &LoopCacheRecord,
    ) -> Result<(), PersistenceError>;

    /// Load the tenant's last-persisted loop cache, if any
    fn load_loops(&self, tenant: &TenantId) -> Result<Option<LoopCacheRecord>, PersistenceError>;
}
