pub mod api;
pub mod config;
pub mod observability;
pub mod qr;
pub mod queue;
pub mod secrets;
pub mod storage;
pub mod worker;
