//! ondie-cache - OnDie CA artifact cache updater
//!
//! Downloads the OnDie certificate and CRL bundle, stages it next to the
//! live cache files and signals readers that an update is ready.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod refresh;
pub mod ui;

pub use error::{CacheError, CacheResult};
