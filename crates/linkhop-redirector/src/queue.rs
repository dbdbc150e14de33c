use std::hash::{BuildHasher, RandomState};
use std::sync::Arc;
use std::time::Duration;

use crate::redirector::{Redirector, Visit};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, TypedBuilder)]
pub struct QueueSettings {
    /// Worker tasks. Each short id is always handled by the same worker.
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Pending visits per worker.
    #[builder(default = DEFAULT_CAPACITY)]
    pub capacity: usize,
    /// How long `submit` waits for room before dropping a visit.
    #[builder(default = DEFAULT_ENQUEUE_TIMEOUT)]
    pub enqueue_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Handle used by request handlers to enqueue visits.
#[derive(Debug, Clone)]
pub struct VisitSender {
    shards: Arc<[mpsc::Sender<Visit>]>,
    hasher: RandomState,
    enqueue_timeout: Duration,
}

impl VisitSender {
    fn shard(&self, visit: &Visit) -> &mpsc::Sender<Visit> {
        let hash = self.hasher.hash_one(visit.short_id.as_str());
        // shards is never empty, see `VisitQueue::spawn`
        &self.shards[(hash % self.shards.len() as u64) as usize]
    }

    /// Enqueues `visit` on the worker that owns its short id.
    ///
    /// When that worker is behind, waits up to the configured enqueue timeout
    /// for room. Returns `false` if the visit was dropped because the timeout
    /// elapsed or the queue is shut down.
    pub async fn submit(&self, visit: Visit) -> bool {
        match self
            .shard(&visit)
            .send_timeout(visit, self.enqueue_timeout)
            .await
        {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(visit)) => {
                warn!(
                    code = %visit.short_id,
                    timeout = ?self.enqueue_timeout,
                    "visit queue saturated, dropping visit"
                );
                false
            }
            Err(SendTimeoutError::Closed(visit)) => {
                warn!(code = %visit.short_id, "visit queue closed, dropping visit");
                false
            }
        }
    }
}

/// Queue of visits drained by a fixed set of workers.
///
/// Visits are partitioned by short id, so every visit to one link reaches
/// the store in submission order while different links are recorded in
/// parallel.
#[derive(Debug)]
pub struct VisitQueue {
    sender: VisitSender,
    workers: Vec<JoinHandle<u64>>,
}

impl VisitQueue {
    /// Starts the workers on the current tokio runtime.
    pub fn spawn<R>(redirector: Arc<R>, settings: QueueSettings) -> Self
    where
        R: Redirector + ?Sized,
    {
        let worker_count = settings.workers.max(1);
        let mut shards = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);

        for worker in 0..worker_count {
            let (tx, mut rx) = mpsc::channel::<Visit>(settings.capacity.max(1));
            let redirector = Arc::clone(&redirector);
            shards.push(tx);
            workers.push(tokio::spawn(async move {
                let mut recorded = 0u64;
                while let Some(visit) = rx.recv().await {
                    redirector.record_visit(visit).await;
                    recorded += 1;
                }
                debug!(worker, recorded, "visit worker finished");
                recorded
            }));
        }

        Self {
            sender: VisitSender {
                shards: shards.into(),
                hasher: RandomState::new(),
                enqueue_timeout: settings.enqueue_timeout,
            },
            workers,
        }
    }

    pub fn sender(&self) -> VisitSender {
        self.sender.clone()
    }

    /// Closes this handle's sender and waits until every queued visit has
    /// been recorded. Returns the number of visits recorded.
    ///
    /// The workers only stop once all [`VisitSender`] clones are dropped.
    pub async fn shutdown(self) -> u64 {
        drop(self.sender);
        let mut recorded = 0;
        for worker in self.workers {
            match worker.await {
                Ok(count) => recorded += count,
                Err(e) => warn!(error = %e, "visit worker failed"),
            }
        }
        info!(recorded, "visit queue drained");
        recorded
    }
}
