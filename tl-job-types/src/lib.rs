//! Typed messages passed between the discovery orchestrator and its worker
//! pool, and to discovery subscribers
//!
//! Mirrors the teacher's job-types crate: worker loops match on a small
//! closed set of message types rather than passing closures across thread
//! boundaries, so a job's shape (and its metrics) are visible at the
//! channel's type.
#![deny(missing_docs)]

use std::sync::Arc;

use tl_common::{CanonicalId, TenantId, TradeLoop, WalletIx};
use tl_cycle_enum::{CommunityResult, DedupGate, EnumConfig};
use tl_graph_store::GraphSnapshot;
use tl_util::concurrency::CancellationCell;
use tl_util::metered_channels::{metered_unbounded, MeteredReceiver, MeteredSender};

/// One community's worth of cycle enumeration work, dispatched onto the
/// community worker pool
pub struct CommunityJob {
    /// Tenant this job belongs to, for logging/metrics correlation
    pub tenant: TenantId,
    /// Opaque id of the community within this discovery run
    pub community_id: u32,
    /// Read-only snapshot the job enumerates over
    pub snapshot: GraphSnapshot,
    /// Wallets (members plus any promoted bridge nodes) to enumerate
    pub members: Vec<WalletIx>,
    /// Enumeration parameters for this run
    pub config: EnumConfig,
    /// Dedup gate shared across every community in this discovery run
    pub dedup: Arc<DedupGate>,
    /// Cooperative cancellation shared across the whole discovery request
    pub cancel: CancellationCell,
    /// Where to send the result
    pub reply: MeteredSender<CommunityJobResult>,
}

/// The result of running one `CommunityJob`
pub struct CommunityJobResult {
    /// Echoes `CommunityJob::community_id`
    pub community_id: u32,
    /// The enumerator's output, or `None` if the job panicked and was
    /// caught by the worker (failure is logged and skipped, per the
    /// non-fatal community-job failure semantics)
    pub result: Option<CommunityResult>,
}

/// Build a metered job queue and its paired result queue for the community
/// worker pool
pub fn community_job_channels() -> (
    (MeteredSender<CommunityJob>, MeteredReceiver<CommunityJob>),
    (MeteredSender<CommunityJobResult>, MeteredReceiver<CommunityJobResult>),
) {
    (
        metered_unbounded("tl_community_job_queue_depth"),
        metered_unbounded("tl_community_result_queue_depth"),
    )
}

/// Published to subscribers whenever a tenant's active loop set changes,
/// whether from a full discovery run or an incremental delta
#[derive(Clone, Debug)]
pub struct LoopsChanged {
    /// Tenant whose loops changed
    pub tenant: TenantId,
    /// Newly discovered or re-validated loops
    pub added: Vec<TradeLoop>,
    /// Canonical ids of loops no longer valid
    pub removed: Vec<CanonicalId>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn community_job_channels_round_trip() {
        let ((job_tx, job_rx), (result_tx, result_rx)) = community_job_channels();

        let store = tl_graph_store::GraphStore::new(TenantId::from("t"), None);
        let job = CommunityJob {
            tenant: TenantId::from("t"),
            community_id: 0,
            snapshot: store.snapshot(),
            members: vec![],
            config: EnumConfig::default(),
            dedup: Arc::new(DedupGate::new(1000, 0.001)),
            cancel: CancellationCell::new(),
            reply: result_tx,
        };
        job_tx.send(job).unwrap();

        let received = job_rx.recv().unwrap();
        assert_eq!(received.community_id, 0);

        received
            .reply
            .send(CommunityJobResult { community_id: 0, result: None })
            .unwrap();
        let result = result_rx.recv().unwrap();
        assert_eq!(result.community_id, 0);
    }
}
