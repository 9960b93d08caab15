//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request and response model shared by the fetch pipeline and the worker
//! - Partitioned response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod locator;
pub mod request;
pub mod response;

pub use cache::{CacheDb, Partition, PutOutcome, RequestKey};
pub use config::{AppConfig, ConfigError, WorkerConfig};
pub use error::Error;
pub use request::{InterceptedRequest, RequestMode};
pub use response::{Response, ResponseKind};
