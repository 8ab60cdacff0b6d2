//! In-memory reference backend, mainly useful for tests and for running
//! the engine with persistence disabled but the same call shape

use std::collections::HashMap;

use parking_lot::RwLock;
use tl_common::TenantId;

use crate::backend::{PersistenceBackend, PersistenceError};
use crate::record::{GraphRecord, LoopCacheRecord};

/// Keeps the latest graph/loop record per tenant in memory; nothing
/// survives process restart
#[derive(Default)]
pub struct InMemoryBackend {
    graphs: RwLock<HashMap<TenantId, GraphRecord>>,
    loops: RwLock<HashMap<TenantId, LoopCacheRecord>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceBackend for InMemoryBackend {
    fn save_graph(&self, tenant: &TenantId, record: &GraphRecord) -> Result<(), PersistenceError> {
        self.graphs.write().insert(tenant.clone(), record.clone());
        Ok(())
    }

    fn load_graph(&self, tenant: &TenantId) -> Result<Option<GraphRecord>, PersistenceError> {
        Ok(self.graphs.read().get(tenant).cloned())
    }

    fn save_loops(
        &self,
        tenant: &TenantId,
        record: &LoopCacheRecord,
    ) -> Result<(), PersistenceError> {
        self.loops.write().insert(tenant.clone(), record.clone());
        Ok(())
    }

    fn load_loops(&self, tenant: &TenantId) -> Result<Option<LoopCacheRecord>, PersistenceError> {
        Ok(self.loops.read().get(tenant).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_graph_record() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::from("t1");
        let record = GraphRecord::default();

        backend.save_graph(&tenant, &record).unwrap();
        assert_eq!(backend.load_graph(&tenant).unwrap(), Some(record));
    }

    #[test]
    fn unknown_tenant_loads_as_none() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.load_graph(&TenantId::from("ghost")).unwrap(), None);
    }
}
