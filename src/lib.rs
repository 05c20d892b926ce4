pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod infra;
pub mod logging;
pub mod metrics;
pub mod reader;
pub mod server;
pub mod storage;
pub mod types;

pub use error::{EnrichError, Result};
