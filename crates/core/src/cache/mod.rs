//! SQLite-backed partitioned response cache.
//!
//! This module provides the cache namespace the worker reads and writes:
//!
//! - Named partitions created lazily on first open
//! - Entries keyed by a SHA-256 digest of method and URL
//! - Scoped lookups, cross-partition lookups and fail-soft writes
//! - Automatic schema migrations and WAL mode

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::PutOutcome;
pub use hash::RequestKey;
pub use partitions::{Partition, PartitionStats};
