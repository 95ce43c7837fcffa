use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::UploadBroker;
use crate::storage::StorageClient;

/// Read-only dependencies shared by every request, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<StorageClient>,
    pub broker: Arc<UploadBroker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: Arc<StorageClient>,
        broker: UploadBroker,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            broker: Arc::new(broker),
            metrics,
        }
    }
}
