//! Partition admin tools.

pub mod list;
pub mod purge;

pub use list::list_impl;
pub use purge::{CachePurgeParams, purge_impl};
