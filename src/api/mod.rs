mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod validation;

pub use error::{ApiError, StartupError};
pub use server::{Service, bootstrap, router, run};
