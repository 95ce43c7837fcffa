pub mod broker;

pub use broker::{QueueError, UploadBroker, UploadEnvelope, UploadJob};
