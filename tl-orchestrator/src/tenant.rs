//! The per-process tenant registry (Design Notes: "the sole process-wide
//! singleton")

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tl_common::{CanonicalId, DeltaEvent, TenantId, TradeLoop};
use tl_graph_store::GraphStore;

/// Everything the registry tracks for one tenant
pub struct TenantHandle {
    tenant: TenantId,
    /// This tenant's graph store
    pub store: GraphStore,
    /// Currently tracked loops, keyed by canonical id
    pub loop_cache: RwLock<HashMap<CanonicalId, TradeLoop>>,
    last_active_millis: AtomicU64,
}

impl TenantHandle {
    fn new(tenant: TenantId, delta_tx: Option<crossbeam::channel::Sender<DeltaEvent>>) -> Self {
        let store = GraphStore::new(tenant.clone(), delta_tx);
        Self {
            tenant,
            store,
            loop_cache: RwLock::new(HashMap::new()),
            last_active_millis: AtomicU64::new(tl_util::now_millis()),
        }
    }

    /// This handle's tenant id
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Record activity now, resetting the idle-eviction clock
    pub fn touch(&self) {
        self.last_active_millis.store(tl_util::now_millis(), Ordering::Relaxed);
    }

    fn idle_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.last_active_millis.load(Ordering::Relaxed))
    }
}

/// Process-wide map from tenant id to tenant state, with idle eviction
///
/// Lazily inserts a tenant's handle on first access rather than requiring
/// upfront provisioning.
#[derive(Default)]
pub struct TenantRegistry {
    tenants: RwLock<HashMap<TenantId, Arc<TenantHandle>>>,
    delta_tx: Option<crossbeam::channel::Sender<DeltaEvent>>,
}

impl TenantRegistry {
    /// Create an empty registry whose tenants publish no delta events
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose tenants publish every mutation onto
    /// `delta_tx`, for the Delta Engine to consume
    pub fn with_delta_sender(delta_tx: crossbeam::channel::Sender<DeltaEvent>) -> Self {
        Self { tenants: RwLock::new(HashMap::new()), delta_tx: Some(delta_tx) }
    }

    /// Fetch a tenant's handle, creating it if this is the first time the
    /// tenant has been seen
    pub fn get_or_create(&self, tenant: &TenantId) -> Arc<TenantHandle> {
        if let Some(handle) = self.tenants.read().get(tenant) {
            handle.touch();
            return handle.clone();
        }

        let mut tenants = self.tenants.write();
        let handle = tenants
            .entry(tenant.clone())
            .or_insert_with(|| Arc::new(TenantHandle::new(tenant.clone(), self.delta_tx.clone())))
            .clone();
        handle.touch();
        handle
    }

    /// Number of tenants currently resident
    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    /// Whether the registry currently holds no tenants
    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }

    /// Evict every tenant idle for at least `ttl`, returning their ids
    ///
    /// Callers that configure a persistence backend should flush an
    /// evicted tenant's state before calling this, since eviction drops
    /// the handle (and with it the in-memory graph and loop cache).
    pub fn evict_idle(&self, ttl: Duration) -> Vec<TenantId> {
        let now = tl_util::now_millis();
        let ttl_millis = ttl.as_millis() as u64;
        let mut evicted = Vec::new();

        self.tenants.write().retain(|id, handle| {
            let keep = handle.idle_millis(now) < ttl_millis;
            if !keep {
                evicted.push(id.clone());
            }
            keep
        });

        evicted
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn get_or_create_returns_the_same_handle_on_repeat_calls() {
        let registry = TenantRegistry::new();
        let tenant = TenantId::from("t1");

        let a = registry.get_or_create(&tenant);
        let b = registry.get_or_create(&tenant);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn evict_idle_removes_only_stale_tenants() {
        let registry = TenantRegistry::new();
        registry.get_or_create(&TenantId::from("stale"));
        std::thread::sleep(Duration::from_millis(5));
        registry.get_or_create(&TenantId::from("fresh"));

        let evicted = registry.evict_idle(Duration::from_millis(2));
        assert!(evicted.contains(&TenantId::from("stale")));
        assert!(!evicted.contains(&TenantId::from("fresh")));
    }
}
