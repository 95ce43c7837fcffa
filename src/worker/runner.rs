//! Upload runner - processes individual UploadEnvelope messages

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::observability::Metrics;
use crate::queue::UploadEnvelope;
use crate::storage::{PNG_CONTENT_TYPE, StorageClient, StorageError, UploadMetadata};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Upload failed: {0}")]
    UploadFailed(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Persist one QR image. Failures are logged and counted, never retried.
pub async fn process_upload(
    envelope: UploadEnvelope,
    storage: &StorageClient,
    metrics: &Metrics,
) -> Result<UploadMetadata> {
    let UploadEnvelope { seq, job } = envelope;
    let queued_ms = (Utc::now() - job.enqueued_at).num_milliseconds();

    match storage
        .upload(&job.blob_path, job.png, PNG_CONTENT_TYPE)
        .await
    {
        Ok(meta) => {
            metrics.upload_succeeded();
            info!(seq, id = %job.id, blob = %meta.key, size = meta.size, queued_ms, "Uploaded to blob");
            Ok(meta)
        }
        Err(e) => {
            metrics.upload_failed();
            error!(seq, id = %job.id, blob = %job.blob_path, error = %e, "Upload failed");
            Err(e.into())
        }
    }
}

/// Drain one worker channel until every sender is gone
pub async fn run_worker(
    worker_id: usize,
    mut receiver: mpsc::Receiver<UploadEnvelope>,
    storage: Arc<StorageClient>,
    metrics: Arc<Metrics>,
) {
    info!(worker_id, "Upload worker started");

    while let Some(envelope) = receiver.recv().await {
        let _ = process_upload(envelope, &storage, &metrics).await;
    }

    info!(worker_id, "Upload worker stopped");
}
