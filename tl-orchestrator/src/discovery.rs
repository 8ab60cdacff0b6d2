//! Full discovery (C6): snapshot -> SCC -> community partition -> per-
//! community enumeration -> global dedup -> rank -> trim

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tl_common::{EngineError, TenantId, TradeLoop, WalletIx};
use tl_cycle_enum::{DedupGate, EnumConfig, ScoringWeights};
use tl_job_types::{CommunityJob, LoopsChanged};
use tl_util::concurrency::CancellationCell;
use tl_util::metered_channels::metered_unbounded;

use crate::tenant::TenantRegistry;
use crate::worker_pool::CommunityWorkerPool;

/// Per-call discovery options; defaults mirror the documented engine
/// configuration (see `tl_config::EngineConfig`)
#[derive(Clone, Debug)]
pub struct DiscoveryOpts {
    /// Hard cap on cycle length
    pub max_depth: usize,
    /// Floor on quality score for emission
    pub min_quality_score: f64,
    /// Sort-and-trim ceiling on returned loops
    pub max_results: usize,
    /// Per-request wall-clock deadline
    pub timeout_ms: u64,
    /// Allow bundling multiple items per edge
    pub enable_bundling: bool,
    /// Allow cycles to cross community boundaries
    pub enable_cross_community: bool,
    /// Dedup Bloom filter target capacity
    pub bloom_capacity: usize,
    /// Dedup Bloom filter target false-positive rate
    pub bloom_fpr: f64,
    /// C4 size threshold
    pub max_community_size: usize,
    /// C5 ceiling on cycles emitted per community
    pub max_cycles_per_scc: usize,
    /// Scoring weights
    pub weights: ScoringWeights,
}

impl From<&tl_config::EngineConfig> for DiscoveryOpts {
    fn from(config: &tl_config::EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_quality_score: config.min_quality_score,
            max_results: config.max_results,
            timeout_ms: config.timeout_ms,
            enable_bundling: config.enable_bundling,
            enable_cross_community: config.enable_cross_community,
            bloom_capacity: config.bloom_capacity,
            bloom_fpr: config.bloom_fpr,
            max_community_size: config.max_community_size,
            max_cycles_per_scc: config.max_cycles_per_scc,
            weights: config.weights,
        }
    }
}

/// Counts, flags, and per-phase timing for one discovery run
#[derive(Clone, Debug, Default)]
pub struct DiscoveryMetadata {
    /// Non-trivial SCCs found
    pub sccs_processed: usize,
    /// Communities enumerated (1 per SCC below threshold, N per oversized
    /// SCC)
    pub communities_processed: usize,
    /// Total loops returned after rank/trim
    pub loops_found: usize,
    /// Exact duplicates discarded by the dedup gate
    pub duplicates_suppressed: usize,
    /// Set if the SCC finder or any community enumeration hit its
    /// wall-clock budget
    pub timed_out: bool,
    /// Set if any community hit `max_cycles_per_scc`
    pub truncated: bool,
    /// Set if any community job failed and was skipped
    pub partial: bool,
    /// Time spent in SCC decomposition
    pub scc_phase: Duration,
    /// Time spent partitioning oversized SCCs into communities
    pub community_phase: Duration,
    /// Time spent dispatching and collecting community enumeration jobs
    pub enumerate_phase: Duration,
}

/// Assembles C1/C3/C4/C5 behind the discovery API
pub struct DiscoveryOrchestrator {
    registry: Arc<TenantRegistry>,
    pool: CommunityWorkerPool,
    loops_changed: tokio::sync::broadcast::Sender<LoopsChanged>,
}

impl DiscoveryOrchestrator {
    /// Build an orchestrator with its own tenant registry and a community
    /// worker pool sized to `worker_count`
    pub fn new(worker_count: usize) -> Self {
        let (loops_changed, _) = tokio::sync::broadcast::channel(1024);
        Self {
            registry: Arc::new(TenantRegistry::new()),
            pool: CommunityWorkerPool::new(worker_count),
            loops_changed,
        }
    }

    /// Build an orchestrator sharing an existing registry (used when the
    /// Delta Engine needs to observe the same tenant state)
    pub fn with_registry(worker_count: usize, registry: Arc<TenantRegistry>) -> Self {
        let (loops_changed, _) = tokio::sync::broadcast::channel(1024);
        Self { registry, pool: CommunityWorkerPool::new(worker_count), loops_changed }
    }

    /// The shared tenant registry
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// Subscribe to `loops_changed` events for every tenant
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LoopsChanged> {
        self.loops_changed.subscribe()
    }

    /// Publish a `loops_changed` event combining newly added and removed
    /// loops in one notification
    ///
    /// Used by the Delta Engine, which discovers `added` loops via
    /// `discover_scoped` and computes `removed` itself by invalidating
    /// cached loops the triggering mutation affected.
    pub(crate) fn publish_loops_changed(&self, event: LoopsChanged) {
        if !event.added.is_empty() || !event.removed.is_empty() {
            let _ = self.loops_changed.send(event);
        }
    }

    /// Run full discovery for `tenant`, over every wallet currently in its
    /// graph
    #[tracing::instrument(skip(self, opts), fields(tenant = %tenant))]
    pub async fn discover(
        &self,
        tenant: &TenantId,
        opts: &DiscoveryOpts,
    ) -> Result<(Vec<TradeLoop>, DiscoveryMetadata), EngineError> {
        let handle = self.registry.get_or_create(tenant);
        let snapshot = handle.store.snapshot();
        let vertices: Vec<WalletIx> = snapshot.all_wallets().collect();
        let (ranked, added, metadata) = self.run(tenant, &vertices, opts).await?;
        self.publish_loops_changed(LoopsChanged { tenant: tenant.clone(), added, removed: Vec::new() });
        Ok((ranked, metadata))
    }

    /// Run discovery restricted to the subgraph induced by `vertices`
    ///
    /// Used by the Delta Engine to re-run C3-C5 over just the affected
    /// wallet set plus its boundary, instead of the whole tenant graph.
    /// Does not broadcast `loops_changed` itself; the caller combines
    /// `added` with whatever it invalidated and broadcasts once.
    pub(crate) async fn discover_scoped(
        &self,
        tenant: &TenantId,
        vertices: &[WalletIx],
        opts: &DiscoveryOpts,
    ) -> Result<(Vec<TradeLoop>, Vec<TradeLoop>, DiscoveryMetadata), EngineError> {
        self.run(tenant, vertices, opts).await
    }

    async fn run(
        &self,
        tenant: &TenantId,
        vertices: &[WalletIx],
        opts: &DiscoveryOpts,
    ) -> Result<(Vec<TradeLoop>, Vec<TradeLoop>, DiscoveryMetadata), EngineError> {
        let handle = self.registry.get_or_create(tenant);
        let snapshot = handle.store.snapshot();
        let deadline = Instant::now() + Duration::from_millis(opts.timeout_ms);
        let cancel = CancellationCell::new();

        let scc_start = Instant::now();
        let scc_budget = deadline.saturating_duration_since(Instant::now());
        let scc_result = tl_scc::find_sccs_within(&snapshot, vertices, scc_budget);
        let scc_phase = scc_start.elapsed();

        let community_start = Instant::now();
        let mut job_members: Vec<Vec<WalletIx>> = Vec::new();
        for scc in &scc_result.components {
            if scc.len() > opts.max_community_size {
                let partitioned = tl_community::partition(
                    &snapshot,
                    scc,
                    opts.max_community_size,
                    opts.enable_cross_community,
                );
                for community in partitioned.values() {
                    job_members.push(community.enumeration_set());
                }
            } else {
                job_members.push(scc.clone());
            }
        }
        let community_phase = community_start.elapsed();

        let enumerate_start = Instant::now();
        let dedup = Arc::new(DedupGate::new(opts.bloom_capacity, opts.bloom_fpr));
        let config = EnumConfig {
            max_depth: opts.max_depth,
            max_cycles_per_scc: opts.max_cycles_per_scc,
            t_comm: deadline.saturating_duration_since(Instant::now()),
            enable_bundling: opts.enable_bundling,
            weights: opts.weights,
        };

        let (result_tx, result_rx) = metered_unbounded("tl_discovery_result_queue_depth");
        let job_count = job_members.len();
        for (i, members) in job_members.into_iter().enumerate() {
            self.pool.submit(CommunityJob {
                tenant: tenant.clone(),
                community_id: i as u32,
                snapshot: snapshot.clone(),
                members,
                config: config.clone(),
                dedup: dedup.clone(),
                cancel: cancel.clone(),
                reply: result_tx.clone(),
            });
        }
        drop(result_tx);

        let mut all_loops = Vec::new();
        let mut communities_processed = 0usize;
        let mut duplicates_suppressed = 0usize;
        let mut truncated = false;
        let mut timed_out = scc_result.timed_out;
        let mut partial = false;

        for _ in 0..job_count {
            if Instant::now() >= deadline {
                cancel.cancel();
            }
            match result_rx.recv() {
                Ok(job_result) => {
                    communities_processed += 1;
                    match job_result.result {
                        Some(cr) => {
                            duplicates_suppressed += cr.duplicates_suppressed;
                            truncated |= cr.truncated;
                            timed_out |= cr.timed_out;
                            all_loops.extend(cr.loops);
                        }
                        None => partial = true,
                    }
                }
                Err(_) => break,
            }
        }
        let enumerate_phase = enumerate_start.elapsed();

        all_loops.retain(|l| l.quality_score >= opts.min_quality_score);
        all_loops.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.canonical_id.cmp(&b.canonical_id))
        });
        all_loops.truncate(opts.max_results);

        let mut added = Vec::new();
        {
            let mut cache = handle.loop_cache.write();
            for candidate in &all_loops {
                cache.entry(candidate.canonical_id.clone()).or_insert_with(|| {
                    added.push(candidate.clone());
                    candidate.clone()
                });
            }
        }

        let metadata = DiscoveryMetadata {
            sccs_processed: scc_result.components.len(),
            communities_processed,
            loops_found: all_loops.len(),
            duplicates_suppressed,
            timed_out,
            truncated,
            partial,
            scc_phase,
            community_phase,
            enumerate_phase,
        };

        Ok((all_loops, added, metadata))
    }

    /// Loops currently tracked for `tenant` whose status is not terminal
    pub fn active_loops(&self, tenant: &TenantId) -> Vec<TradeLoop> {
        let handle = self.registry.get_or_create(tenant);
        handle.loop_cache.read().values().filter(|l| !l.status.is_terminal()).cloned().collect()
    }

    /// Loops currently tracked for `tenant` that include `wallet` as a
    /// participant
    pub fn loops_for_wallet(
        &self,
        tenant: &TenantId,
        wallet: &tl_common::WalletId,
    ) -> Vec<TradeLoop> {
        let handle = self.registry.get_or_create(tenant);
        handle
            .loop_cache
            .read()
            .values()
            .filter(|l| l.participant_ids().any(|w| w == wallet))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_common::WalletId;

    fn opts() -> DiscoveryOpts {
        DiscoveryOpts::from(&tl_config::EngineConfig::default())
    }

    #[tokio::test]
    async fn discovers_a_three_party_cycle() {
        let orchestrator = DiscoveryOrchestrator::new(2);
        let tenant = TenantId::from("t1");
        let handle = orchestrator.registry().get_or_create(&tenant);

        handle.store.add_owned(&WalletId::from("A"), &"a1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("B"), &"b1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("C"), &"c1".into()).unwrap();
        handle.store.add_want(&WalletId::from("A"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("B"), &"c1".into()).unwrap();
        handle.store.add_want(&WalletId::from("C"), &"a1".into()).unwrap();

        let (loops, metadata) = orchestrator.discover(&tenant, &opts()).await.unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(metadata.sccs_processed, 1);
        assert!(!metadata.partial);
    }

    #[tokio::test]
    async fn rediscovery_is_idempotent_on_loop_identity() {
        let orchestrator = DiscoveryOrchestrator::new(2);
        let tenant = TenantId::from("t1");
        let handle = orchestrator.registry().get_or_create(&tenant);

        handle.store.add_owned(&WalletId::from("A"), &"a1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("B"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("A"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("B"), &"a1".into()).unwrap();

        let (first, _) = orchestrator.discover(&tenant, &opts()).await.unwrap();
        let (second, _) = orchestrator.discover(&tenant, &opts()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].canonical_id, second[0].canonical_id);
    }
}
