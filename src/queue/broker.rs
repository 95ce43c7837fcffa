use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::qr_blob_path;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("every upload worker channel is full")]
    Saturated,
    #[error("no upload worker is accepting jobs")]
    NoWorkers,
}

/// One QR image waiting to be persisted
#[derive(Clone, Debug)]
pub struct UploadJob {
    pub id: Uuid,
    pub blob_path: String,
    pub png: Bytes,
    pub enqueued_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(id: Uuid, png: Bytes) -> Self {
        Self {
            id,
            blob_path: qr_blob_path(&id),
            png,
            enqueued_at: Utc::now(),
        }
    }
}

/// UploadEnvelope wraps an UploadJob with its sequence number
#[derive(Clone, Debug)]
pub struct UploadEnvelope {
    pub seq: u64,
    pub job: UploadJob,
}

/// UploadBroker distributes upload jobs from the API to the worker pool
///
/// Architecture:
/// 1. API calls `broker.enqueue(job)`
/// 2. Broker stamps a sequence number
/// 3. Broker sends UploadEnvelope{seq, job} to a worker via mpsc channel
/// 4. Round-robin distribution across worker pool
/// 5. Bounded channels; a full backlog rejects the job instead of waiting
///
/// Jobs live only in channel memory: a process exit loses whatever is queued.
pub struct UploadBroker {
    worker_channels: Vec<mpsc::Sender<UploadEnvelope>>,
    next_worker: AtomicUsize,
    next_seq: AtomicU64,
}

impl UploadBroker {
    /// Create a new UploadBroker with worker channels
    ///
    /// Returns:
    /// - UploadBroker instance (to be passed to API via Arc)
    /// - Vec of receivers (one per worker, for spawning workers)
    pub fn new(
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<UploadEnvelope>>) {
        let num_workers = num_workers.max(1);
        let channel_size = channel_size.max(1);
        info!(
            num_workers,
            channel_size, "Creating UploadBroker with worker channels"
        );

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            worker_channels.push(tx);
            worker_receivers.push(rx);
            debug!(worker_id, "Created worker channel");
        }

        let broker = Self {
            worker_channels,
            next_worker: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
        };

        (broker, worker_receivers)
    }

    /// Hand a job to the next worker (round-robin) without waiting
    ///
    /// A full or closed channel is skipped in favour of the next one. When no
    /// channel takes the job it is returned as an error and the caller
    /// decides what to log; the caller never waits on upload progress.
    pub fn enqueue(&self, job: UploadJob) -> Result<u64, QueueError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let start = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let mut envelope = UploadEnvelope { seq, job };
        let mut saturated = false;

        for offset in 0..self.worker_channels.len() {
            let worker_idx = start.wrapping_add(offset) % self.worker_channels.len();

            match self.worker_channels[worker_idx].try_send(envelope) {
                Ok(()) => {
                    debug!(seq, worker_idx, "Upload job sent to worker");
                    return Ok(seq);
                }
                Err(TrySendError::Full(returned)) => {
                    debug!(seq, worker_idx, "Worker channel full, trying next worker");
                    saturated = true;
                    envelope = returned;
                }
                Err(TrySendError::Closed(returned)) => {
                    warn!(seq, worker_idx, "Worker channel closed, trying next worker");
                    envelope = returned;
                }
            }
        }

        if saturated {
            Err(QueueError::Saturated)
        } else {
            Err(QueueError::NoWorkers)
        }
    }

    /// Get number of workers
    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// Check if all worker channels are healthy (not closed)
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
