//! The Delta Engine (C6): incremental loop maintenance driven by
//! `DeltaEvent`s instead of full re-discovery
//!
//! Mutations batch within a debounce window, get grouped by tenant and
//! ordered by sequence number, then each tenant's batch invalidates any
//! cached loop whose participants fall inside the affected wallet set
//! and re-runs discovery restricted to that set plus a one-hop
//! boundary. Grounded on the same dedicated-consumer-loop shape as
//! `worker_pool`'s job threads, generalized from a blocking thread to
//! an async task bridging a `crossbeam` channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tl_common::{CanonicalId, DeltaEvent, TenantId, TradeLoop, WalletId, WalletIx};
use tl_graph_store::GraphSnapshot;
use tl_job_types::LoopsChanged;

use crate::discovery::{DiscoveryOpts, DiscoveryOrchestrator};

/// What one batch of `DeltaEvent`s did to a tenant's loop cache
pub struct DeltaOutcome {
    /// Loops newly discovered or re-validated by the scoped re-run
    pub added: Vec<TradeLoop>,
    /// Loops invalidated by the triggering mutation, in their final
    /// (`Cancelled`) state
    pub invalidated: Vec<TradeLoop>,
}

/// Consumes `DeltaEvent`s and keeps each tenant's loop cache in sync
/// without re-running full discovery on every mutation
pub struct DeltaEngine {
    orchestrator: Arc<DiscoveryOrchestrator>,
    debounce: Duration,
    reach_radius: usize,
    opts: DiscoveryOpts,
}

impl DeltaEngine {
    /// Build a Delta Engine sharing `orchestrator`'s tenant registry
    ///
    /// `debounce` is how long to wait for a mutation burst to settle
    /// before reacting; `reach_radius` bounds how many want-graph hops
    /// out from a mutated wallet count as "affected". `opts` is the
    /// engine's resolved discovery configuration, used unmodified for
    /// every scoped re-discovery so incremental results never diverge
    /// from what a full `discover()` would produce under the same config.
    pub fn new(
        orchestrator: Arc<DiscoveryOrchestrator>,
        debounce: Duration,
        reach_radius: usize,
        opts: DiscoveryOpts,
    ) -> Self {
        Self { orchestrator, debounce, reach_radius, opts }
    }

    /// Process one event immediately, without debouncing, and publish +
    /// return its effect
    ///
    /// Used by ingest-API callers that need the affected loops back
    /// synchronously, as opposed to `run`'s debounced handling of events
    /// arriving from arbitrary graph-store writers.
    pub async fn handle_event(&self, event: DeltaEvent) -> DeltaOutcome {
        let tenant = event.tenant.clone();
        let outcome = self.process_tenant_events(&tenant, std::slice::from_ref(&event)).await;
        self.publish(&tenant, &outcome);
        outcome
    }

    /// Drain `delta_rx` forever, reacting to each debounced batch
    ///
    /// Returns once the channel's last sender is dropped.
    pub async fn run(self: Arc<Self>, delta_rx: crossbeam::channel::Receiver<DeltaEvent>) {
        loop {
            let rx = delta_rx.clone();
            let first = match tokio::task::spawn_blocking(move || rx.recv()).await {
                Ok(Ok(event)) => event,
                _ => return,
            };

            tokio::time::sleep(self.debounce).await;

            let mut batch = vec![first];
            while let Ok(event) = delta_rx.try_recv() {
                batch.push(event);
            }

            self.process_batch(batch).await;
        }
    }

    async fn process_batch(&self, mut events: Vec<DeltaEvent>) {
        events.sort_by(|a, b| a.tenant.cmp(&b.tenant).then(a.seq.cmp(&b.seq)));

        let mut start = 0;
        while start < events.len() {
            let tenant = events[start].tenant.clone();
            let mut end = start + 1;
            while end < events.len() && events[end].tenant == tenant {
                end += 1;
            }
            let outcome = self.process_tenant_events(&tenant, &events[start..end]).await;
            self.publish(&tenant, &outcome);
            start = end;
        }
    }

    fn publish(&self, tenant: &TenantId, outcome: &DeltaOutcome) {
        let removed: Vec<CanonicalId> =
            outcome.invalidated.iter().map(|l| l.canonical_id.clone()).collect();
        self.orchestrator.publish_loops_changed(LoopsChanged {
            tenant: tenant.clone(),
            added: outcome.added.clone(),
            removed,
        });
    }

    async fn process_tenant_events(&self, tenant: &TenantId, events: &[DeltaEvent]) -> DeltaOutcome {
        let handle = self.orchestrator.registry().get_or_create(tenant);
        let snapshot = handle.store.snapshot();

        let origins: Vec<WalletIx> =
            events.iter().filter_map(|e| snapshot.wallet_ix(&e.wallet)).collect();
        if origins.is_empty() {
            return DeltaOutcome { added: Vec::new(), invalidated: Vec::new() };
        }

        let reverse = reverse_adjacency(&snapshot);
        let affected = affected_set(&snapshot, &reverse, &origins, self.reach_radius);
        let scope = affected_set(&snapshot, &reverse, &origins, self.reach_radius + 1);

        let affected_ids: HashSet<WalletId> =
            affected.iter().filter_map(|&ix| snapshot.wallet_id(ix).cloned()).collect();

        let mut invalidated = Vec::new();
        {
            let mut cache = handle.loop_cache.write();
            for loop_ in cache.values_mut() {
                if loop_.status.is_terminal() {
                    continue;
                }
                if loop_.participant_ids().any(|w| affected_ids.contains(w)) {
                    let next = tl_common::LoopStatus::Cancelled { reason: "invalidated".to_string() };
                    if loop_.status.can_transition_to(&next) {
                        loop_.status = next;
                        invalidated.push(loop_.clone());
                    }
                }
            }
        }

        let scope_vec: Vec<WalletIx> = scope.into_iter().collect();
        let added: Vec<TradeLoop> = match self.orchestrator.discover_scoped(tenant, &scope_vec, &self.opts).await {
            Ok((_, added, _)) => added,
            Err(err) => {
                tracing::error!(%tenant, error = %err, "delta engine re-discovery failed");
                Vec::new()
            }
        };

        DeltaOutcome { added, invalidated }
    }
}

/// For every wallet, the set of wallets whose `wanted` edge points at it
fn reverse_adjacency(snapshot: &GraphSnapshot) -> HashMap<WalletIx, Vec<WalletIx>> {
    let mut reverse: HashMap<WalletIx, Vec<WalletIx>> = HashMap::new();
    for wallet in snapshot.all_wallets() {
        for target in snapshot.successors(wallet) {
            reverse.entry(target).or_default().push(wallet);
        }
    }
    reverse
}

/// Every wallet within `radius` want-graph hops (in either direction) of
/// any of `origins`, origins included
fn affected_set(
    snapshot: &GraphSnapshot,
    reverse: &HashMap<WalletIx, Vec<WalletIx>>,
    origins: &[WalletIx],
    radius: usize,
) -> HashSet<WalletIx> {
    let mut visited: HashSet<WalletIx> = origins.iter().copied().collect();
    let mut frontier: Vec<WalletIx> = origins.to_vec();

    for _ in 0..radius {
        let mut next = Vec::new();
        for wallet in &frontier {
            for successor in snapshot.successors(*wallet) {
                if visited.insert(successor) {
                    next.push(successor);
                }
            }
            if let Some(preds) = reverse.get(wallet) {
                for &pred in preds {
                    if visited.insert(pred) {
                        next.push(pred);
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    visited
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_common::{DeltaKind, LoopStatus, Seq};

    fn send_mutation(handle: &crate::tenant::TenantHandle, wallet: &str, item: &str) {
        handle.store.add_want(&WalletId::from(wallet), &item.into()).unwrap();
    }

    #[tokio::test]
    async fn invalidation_cancels_loops_touching_the_affected_set() {
        let orchestrator = Arc::new(DiscoveryOrchestrator::new(1));
        let tenant = TenantId::from("t1");
        let handle = orchestrator.registry().get_or_create(&tenant);

        handle.store.add_owned(&WalletId::from("A"), &"a1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("B"), &"b1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("C"), &"c1".into()).unwrap();
        handle.store.add_want(&WalletId::from("A"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("B"), &"c1".into()).unwrap();
        handle.store.add_want(&WalletId::from("C"), &"a1".into()).unwrap();

        let opts = DiscoveryOpts::from(&tl_config::EngineConfig::default());
        let (loops, _) = orchestrator.discover(&tenant, &opts).await.unwrap();
        assert_eq!(loops.len(), 1);

        let engine = DeltaEngine::new(orchestrator.clone(), Duration::from_millis(0), 2, opts);
        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: WalletId::from("A"),
            kind: DeltaKind::WantRemoved { item: "b1".into() },
            seq: Seq(1),
        };
        let outcome = engine.handle_event(event).await;

        assert_eq!(outcome.invalidated.len(), 1);
        assert!(matches!(&outcome.invalidated[0].status, LoopStatus::Cancelled { reason } if reason == "invalidated"));
        assert!(orchestrator.active_loops(&tenant).is_empty(), "the only loop should have been invalidated");
    }

    #[tokio::test]
    async fn unrelated_mutation_leaves_the_loop_cache_untouched() {
        let orchestrator = Arc::new(DiscoveryOrchestrator::new(1));
        let tenant = TenantId::from("t1");
        let handle = orchestrator.registry().get_or_create(&tenant);

        handle.store.add_owned(&WalletId::from("A"), &"a1".into()).unwrap();
        handle.store.add_owned(&WalletId::from("B"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("A"), &"b1".into()).unwrap();
        handle.store.add_want(&WalletId::from("B"), &"a1".into()).unwrap();

        let opts = DiscoveryOpts::from(&tl_config::EngineConfig::default());
        let (loops, _) = orchestrator.discover(&tenant, &opts).await.unwrap();
        assert_eq!(loops.len(), 1);

        handle.store.add_owned(&WalletId::from("Z"), &"z1".into()).unwrap();
        send_mutation(&handle, "Z", "z1");

        let engine = DeltaEngine::new(orchestrator.clone(), Duration::from_millis(0), 2, opts);
        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: WalletId::from("Z"),
            kind: DeltaKind::WantAdded { item: "z1".into() },
            seq: Seq(1),
        };
        let outcome = engine.handle_event(event).await;

        assert!(outcome.invalidated.is_empty());
        assert_eq!(orchestrator.active_loops(&tenant).len(), 1);
    }
}
