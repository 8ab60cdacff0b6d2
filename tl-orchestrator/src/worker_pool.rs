//! The community job worker pool
//!
//! Modeled on the teacher's dedicated-thread worker pattern: a fixed set
//! of long-lived OS threads, each driving its own blocking loop over a
//! shared job queue, rather than spawning a thread per job.

use tl_job_types::{CommunityJob, CommunityJobResult};
use tl_util::metered_channels::{metered_unbounded, MeteredSender};

/// A fixed-size pool of threads executing `CommunityJob`s
pub struct CommunityWorkerPool {
    job_tx: MeteredSender<CommunityJob>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl CommunityWorkerPool {
    /// Spawn `worker_count` worker threads (minimum 1) sharing one job
    /// queue
    pub fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx) = metered_unbounded("tl_community_job_queue_depth");
        let workers = (0..worker_count.max(1))
            .map(|i| {
                let rx = job_rx.clone();
                std::thread::Builder::new()
                    .name(format!("tl-community-worker-{i}"))
                    .spawn(move || worker_loop(rx))
                    .expect("failed to spawn community worker thread")
            })
            .collect();

        Self { job_tx, workers }
    }

    /// Enqueue a job; the worker that picks it up replies on
    /// `job.reply`
    pub fn submit(&self, job: CommunityJob) {
        if self.job_tx.send(job).is_err() {
            tracing::error!("community worker pool job queue is closed");
        }
    }

    /// Number of worker threads in this pool
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(rx: tl_util::metered_channels::MeteredReceiver<CommunityJob>) {
    while let Ok(job) = rx.recv() {
        let community_id = job.community_id;
        let reply = job.reply;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tl_cycle_enum::enumerate_community(&job.snapshot, &job.members, &job.config, &job.dedup, &job.cancel)
        }));

        let result = match outcome {
            Ok(result) => Some(result),
            Err(_) => {
                tracing::error!(community_id, "community job panicked; skipping");
                None
            }
        };

        let _ = reply.send(CommunityJobResult { community_id, result });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use tl_common::TenantId;
    use tl_cycle_enum::{DedupGate, EnumConfig};
    use tl_util::concurrency::CancellationCell;
    use tl_util::metered_channels::metered_unbounded;

    #[test]
    fn submitted_job_is_executed_and_replied_to() {
        let pool = CommunityWorkerPool::new(2);
        let (result_tx, result_rx) = metered_unbounded("test_result_queue");

        let store = tl_graph_store::GraphStore::new(TenantId::from("t"), None);
        let job = CommunityJob {
            tenant: TenantId::from("t"),
            community_id: 7,
            snapshot: store.snapshot(),
            members: vec![],
            config: EnumConfig::default(),
            dedup: Arc::new(DedupGate::new(1000, 0.001)),
            cancel: CancellationCell::new(),
            reply: result_tx,
        };

        pool.submit(job);
        let result = result_rx.recv().unwrap();
        assert_eq!(result.community_id, 7);
        assert!(result.result.is_some());
    }
}
