//! The trade loop discovery engine facade
//!
//! Assembles the Graph Store, Canonicalizer, SCC Finder, Community
//! Partitioner, Cycle Enumerator, Discovery Orchestrator, and Delta
//! Engine behind the Discovery/Ingest/Lifecycle/Subscription API.
//! Embedders needing a transport wrap this crate; it speaks no wire
//! protocol of its own.
#![deny(missing_docs)]

mod ingest;

pub use ingest::NftListing;

use std::sync::Arc;

use tl_common::{CanonicalId, DeltaEvent, EngineError, LoopStatus, TenantId, TradeLoop, WalletId};
use tl_config::EngineConfig;
use tl_orchestrator::{
    DeltaEngine, DiscoveryMetadata, DiscoveryOpts, DiscoveryOrchestrator, TenantRegistry,
};
use tl_persistence::PersistenceBackend;

/// The assembled engine: one process-wide registry of tenants, a
/// discovery orchestrator, and a delta engine consuming its mutations
pub struct TradeLoopEngine {
    registry: Arc<TenantRegistry>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    delta: Arc<DeltaEngine>,
    config: EngineConfig,
    persistence: Option<Arc<dyn PersistenceBackend>>,
    delta_task: tokio::task::JoinHandle<()>,
    eviction_task: tokio::task::JoinHandle<()>,
}

impl TradeLoopEngine {
    /// Build an engine from `config`, with no persistence collaborator
    pub fn new(config: EngineConfig) -> Self {
        Self::with_persistence(config, None)
    }

    /// Build an engine from `config`, optionally attaching a persistence
    /// backend for tenant flush/restore
    pub fn with_persistence(
        config: EngineConfig,
        persistence: Option<Arc<dyn PersistenceBackend>>,
    ) -> Self {
        let (delta_tx, delta_rx) = crossbeam::channel::unbounded();
        let registry = Arc::new(TenantRegistry::with_delta_sender(delta_tx));
        let orchestrator =
            Arc::new(DiscoveryOrchestrator::with_registry(config.effective_workers(), registry.clone()));
        let delta = Arc::new(DeltaEngine::new(
            orchestrator.clone(),
            config.debounce_window(),
            config.reach_radius,
            DiscoveryOpts::from(&config),
        ));

        let delta_task = tokio::spawn(delta.clone().run(delta_rx));
        let eviction_task = tokio::spawn(evict_idle_tenants(registry.clone(), config.tenant_idle_ttl()));

        Self { registry, orchestrator, delta, config, persistence, delta_task, eviction_task }
    }

    /// The resolved configuration this engine was built from
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop the background delta-event consumer and tenant eviction sweep
    pub fn shutdown(&self) {
        self.delta_task.abort();
        self.eviction_task.abort();
    }

    fn default_opts(&self) -> DiscoveryOpts {
        DiscoveryOpts::from(&self.config)
    }

    // --- Discovery API ---

    /// Run full discovery for `tenant`, returning ranked loops and run
    /// metadata
    pub async fn discover(
        &self,
        tenant: &TenantId,
    ) -> Result<(Vec<TradeLoop>, DiscoveryMetadata), EngineError> {
        self.orchestrator.discover(tenant, &self.default_opts()).await
    }

    /// Run discovery for `tenant` with caller-supplied options overriding
    /// the engine's configured defaults
    pub async fn discover_with(
        &self,
        tenant: &TenantId,
        opts: &DiscoveryOpts,
    ) -> Result<(Vec<TradeLoop>, DiscoveryMetadata), EngineError> {
        self.orchestrator.discover(tenant, opts).await
    }

    /// Loops currently tracked for `tenant` that include `wallet`
    pub fn loops_for_wallet(&self, tenant: &TenantId, wallet: &WalletId) -> Vec<TradeLoop> {
        self.orchestrator.loops_for_wallet(tenant, wallet)
    }

    /// Non-terminal loops currently tracked for `tenant`
    pub fn active_loops(&self, tenant: &TenantId) -> Vec<TradeLoop> {
        self.orchestrator.active_loops(tenant)
    }

    // --- Subscription API ---

    /// Subscribe to `loops_changed(added, removed)` events across every
    /// tenant
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<tl_job_types::LoopsChanged> {
        self.orchestrator.subscribe()
    }

    /// The shared tenant registry, for embedders that need direct
    /// `GraphStore` access (e.g. bulk import)
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    async fn apply_event(&self, event: DeltaEvent) -> tl_orchestrator::DeltaOutcome {
        self.delta.handle_event(event).await
    }

    // --- Lifecycle API ---

    fn transition(
        &self,
        tenant: &TenantId,
        loop_id: &CanonicalId,
        next: LoopStatus,
    ) -> Result<(), EngineError> {
        let handle = self.registry.get_or_create(tenant);
        let mut cache = handle.loop_cache.write();
        let loop_ = cache
            .get_mut(loop_id)
            .ok_or_else(|| EngineError::UnknownLoop(loop_id.0.clone()))?;

        if !loop_.status.can_transition_to(&next) {
            return Err(EngineError::InvalidLifecycleTransition {
                from: format!("{:?}", loop_.status),
                to: format!("{next:?}"),
            });
        }
        loop_.status = next;
        Ok(())
    }

    /// Transition a loop from `Pending` to `Approved`
    pub fn mark_approved(&self, tenant: &TenantId, loop_id: &CanonicalId) -> Result<(), EngineError> {
        self.transition(tenant, loop_id, LoopStatus::Approved)
    }

    /// Transition a loop from `Approved` to `Executing`
    pub fn mark_executing(&self, tenant: &TenantId, loop_id: &CanonicalId) -> Result<(), EngineError> {
        self.transition(tenant, loop_id, LoopStatus::Executing)
    }

    /// Transition a loop from `Executing` to `Completed`
    pub fn mark_completed(&self, tenant: &TenantId, loop_id: &CanonicalId) -> Result<(), EngineError> {
        self.transition(tenant, loop_id, LoopStatus::Completed)
    }

    /// Cancel a loop from any non-terminal state, recording `reason`
    pub fn cancel(
        &self,
        tenant: &TenantId,
        loop_id: &CanonicalId,
        reason: String,
    ) -> Result<(), EngineError> {
        self.transition(tenant, loop_id, LoopStatus::Cancelled { reason })
    }

    // --- Persistence ---

    /// Flush `tenant`'s graph and loop cache through the attached
    /// persistence backend, if any
    pub fn persist_tenant(&self, tenant: &TenantId) -> Result<(), tl_persistence::PersistenceError> {
        let Some(backend) = &self.persistence else { return Ok(()) };
        let handle = self.registry.get_or_create(tenant);
        let snapshot = handle.store.snapshot();
        backend.save_graph(tenant, &ingest::snapshot_to_record(&snapshot))?;

        let loops = handle.loop_cache.read().clone();
        backend.save_loops(tenant, &tl_persistence::LoopCacheRecord { loops })
    }
}

impl Drop for TradeLoopEngine {
    fn drop(&mut self) {
        self.delta_task.abort();
        self.eviction_task.abort();
    }
}

/// Periodically sweep `registry` for tenants idle longer than `ttl`,
/// evicting them so a long-running process does not retain graphs for
/// tenants that stopped mutating
///
/// Runs on a cadence of `ttl / 10`, floored at one second, so the sweep
/// does not busy-loop when `ttl` is configured very low.
async fn evict_idle_tenants(registry: Arc<TenantRegistry>, ttl: std::time::Duration) {
    let interval = (ttl / 10).max(std::time::Duration::from_secs(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let evicted = registry.evict_idle(ttl);
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "evicted idle tenants");
        }
    }
}
