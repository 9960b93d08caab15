//! cache_list tool implementation.
//!
//! Lists every partition in the store with its entry count, alongside the
//! running worker's generation and state.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{Worker, WorkerState};
use shellcache_core::cache::PartitionStats;

use crate::tools::json_result;

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Generation of the running worker.
    pub generation: String,
    /// Lifecycle state of the running worker.
    #[schemars(with = "String")]
    pub state: WorkerState,
    /// Open pages known to the worker.
    pub clients: usize,
    /// Partitions the running generation keeps on activation.
    pub whitelist: Vec<String>,
    /// Every partition in creation order.
    pub partitions: Vec<PartitionStats>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let partitions = worker.db().partition_stats().await?;
    let output = CacheListOutput {
        generation: worker.generation().to_string(),
        state: worker.state().await,
        clients: worker.clients().len().await,
        whitelist: worker.config().whitelist(),
        partitions,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{output, worker};

    #[tokio::test]
    async fn test_list_empty_store() {
        let worker = worker("v1").await;
        let result = list_impl(&worker).await.unwrap();
        let out: CacheListOutput = output(&result);
        assert_eq!(out.generation, "v1");
        assert_eq!(out.state, WorkerState::Parsed);
        assert!(out.partitions.is_empty());
        assert_eq!(out.clients, 0);
    }

    #[tokio::test]
    async fn test_list_after_install() {
        let worker = worker("v1").await;
        worker.install().await.unwrap();

        let result = list_impl(&worker).await.unwrap();
        let out: CacheListOutput = output(&result);
        assert_eq!(out.state, WorkerState::Installed);
        assert_eq!(out.partitions.len(), 1);
        assert_eq!(out.partitions[0].name, "shellcache-shell-v1");
        assert_eq!(out.partitions[0].entries, 2);
        assert!(out.whitelist.contains(&"shellcache-runtime-v1".to_string()));
    }
}
