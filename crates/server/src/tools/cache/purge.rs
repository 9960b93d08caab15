//! cache_purge tool implementation.
//!
//! Deletes one named partition or every partition in the store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::CacheDb;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Name of the partition to delete.
    #[serde(default)]
    pub name: Option<String>,

    /// Delete every partition.
    #[serde(default)]
    pub all: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Partitions that were deleted.
    pub deleted: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let targets = match (params.name, params.all) {
        (Some(_), true) => {
            return Err(ToolError::InvalidInput("name and all are mutually exclusive".into()).into());
        }
        (None, false) => {
            return Err(ToolError::InvalidInput("one of name or all must be specified".into()).into());
        }
        (Some(name), false) => vec![name],
        (None, true) => cache.partition_names().await?,
    };

    let mut deleted = Vec::new();
    for name in targets {
        if cache.delete_partition(&name).await? {
            tracing::info!(partition = %name, "purged partition");
            deleted.push(name);
        }
    }

    json_result(&CachePurgeOutput { deleted })
}
