//! Background upload workers
//!
//! One tokio task per broker channel. Workers receive upload jobs, write
//! them to object storage and log the outcome.

pub mod runner;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::observability::Metrics;
use crate::queue::UploadEnvelope;
use crate::storage::StorageClient;

/// Handles to the running worker tasks
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for workers to finish queued uploads
    ///
    /// Workers only stop once every broker sender is dropped, so call this
    /// after the broker is gone. Returns false if the timeout elapsed first.
    pub async fn drain(self, timeout: Duration) -> bool {
        let count = self.handles.len();
        let all = join_all(self.handles);

        match tokio::time::timeout(timeout, all).await {
            Ok(()) => {
                info!(workers = count, "Upload workers drained");
                true
            }
            Err(_) => {
                warn!(
                    workers = count,
                    timeout_secs = timeout.as_secs(),
                    "Upload workers did not drain in time; queued uploads are lost"
                );
                false
            }
        }
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Upload worker panicked");
        }
    }
}

/// Spawn one worker per receiver
pub fn spawn_pool(
    receivers: Vec<mpsc::Receiver<UploadEnvelope>>,
    storage: Arc<StorageClient>,
    metrics: Arc<Metrics>,
) -> WorkerPool {
    let handles = receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, receiver)| {
            tokio::spawn(runner::run_worker(
                worker_id,
                receiver,
                storage.clone(),
                metrics.clone(),
            ))
        })
        .collect();

    WorkerPool { handles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{UploadBroker, UploadJob};
    use bytes::Bytes;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_pool_uploads_and_drains() {
        let storage = Arc::new(StorageClient::in_memory());
        let metrics = Arc::new(Metrics::new());
        let (broker, receivers) = UploadBroker::new(2, 4);
        let pool = spawn_pool(receivers, storage.clone(), metrics.clone());
        assert_eq!(pool.len(), 2);

        let mut keys = Vec::new();
        for _ in 0..5 {
            let job = UploadJob::new(Uuid::new_v4(), Bytes::from_static(b"png"));
            keys.push(job.blob_path.clone());
            broker.enqueue(job).unwrap();
        }

        drop(broker);
        assert!(pool.drain(Duration::from_secs(5)).await);

        for key in keys {
            assert!(storage.exists(&key).await.unwrap());
        }
        assert_eq!(metrics.snapshot().uploads_succeeded, 5);
    }

    #[tokio::test]
    async fn test_drain_times_out_while_broker_alive() {
        let (_broker, receivers) = UploadBroker::new(1, 4);
        let pool = spawn_pool(
            receivers,
            Arc::new(StorageClient::in_memory()),
            Arc::new(Metrics::new()),
        );

        assert!(!pool.drain(Duration::from_millis(50)).await);
    }
}
