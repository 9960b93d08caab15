//! Strategy executors.
//!
//! Every executor answers with exactly one response. Network failures fall
//! back to the cache, and a cache miss after that becomes a synthesized 404
//! or 503. Cache reads and writes never fail the response path: read errors
//! count as misses and writes go through [`CacheDb::put_best_effort`].

use std::sync::Arc;

use async_trait::async_trait;
use shellcache_core::config::PartitionNames;
use shellcache_core::{
    CacheDb, Error, InterceptedRequest, Partition, PutOutcome, RequestKey, Response, ResponseKind, WorkerConfig,
};

use super::router::StrategyKind;
use crate::fetch::Network;

/// Uniform contract shared by all caching policies.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn execute(&self, request: &InterceptedRequest) -> Response;
}

/// Whether a response may be written to a partition.
///
/// Genuine successful responses (status 200, `basic` or `cors`) always
/// qualify. With `accept_opaque`, any OK `cors` response qualifies, and so
/// does an opaque response whose status is hidden (0) or OK. Errors,
/// redirects and synthesized responses never do.
pub fn is_cacheable(response: &Response, accept_opaque: bool) -> bool {
    match response.kind {
        ResponseKind::Basic => response.status == 200,
        ResponseKind::Cors => response.status == 200 || (accept_opaque && response.is_ok()),
        ResponseKind::Opaque => accept_opaque && (response.status == 0 || response.is_ok()),
        ResponseKind::OpaqueRedirect | ResponseKind::Error | ResponseKind::Default => false,
    }
}

/// Everything an executor needs: the cache, the network and partition names.
pub struct StrategyContext {
    pub(crate) db: CacheDb,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) config: Arc<WorkerConfig>,
    pub(crate) partitions: PartitionNames,
}

impl StrategyContext {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, config: Arc<WorkerConfig>) -> Self {
        let partitions = config.partition_names();
        Self { db, network, config, partitions }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn partitions(&self) -> &PartitionNames {
        &self.partitions
    }

    pub(crate) async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.network.fetch(request).await
    }

    async fn open(&self, name: &str) -> Option<Partition> {
        match self.db.open_partition(name).await {
            Ok(partition) => Some(partition),
            Err(e) => {
                tracing::warn!(partition = name, error = %e, "failed to open partition");
                None
            }
        }
    }

    /// Scoped lookup; errors are logged and count as a miss.
    pub(crate) async fn lookup_in(&self, name: &str, key: &RequestKey) -> Option<Response> {
        let partition = self.open(name).await?;
        match self.db.match_in(&partition, key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(partition = name, url = key.url(), error = %e, "cache read failed");
                None
            }
        }
    }

    /// Lookup across every partition; errors are logged and count as a miss.
    pub(crate) async fn lookup_any(&self, key: &RequestKey) -> Option<Response> {
        match self.db.match_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = key.url(), error = %e, "cache read failed");
                None
            }
        }
    }

    /// Fail-soft write of a response the caller has already cloned.
    pub(crate) async fn store(&self, name: &str, key: &RequestKey, response: Response, accept_opaque: bool) -> PutOutcome {
        if !is_cacheable(&response, accept_opaque) {
            tracing::debug!(url = key.url(), status = response.status, kind = %response.kind, "not cacheable");
            return PutOutcome::Skipped(format!("{} {} response is not cacheable", response.status, response.kind));
        }
        let Some(partition) = self.open(name).await else {
            return PutOutcome::Skipped(format!("partition {name} unavailable"));
        };
        self.db.put_best_effort(&partition, key, &response).await
    }
}

/// Cache-first against the resource partition, opaque responses allowed.
pub struct DictionaryCacheFirst {
    ctx: Arc<StrategyContext>,
}

#[async_trait]
impl Strategy for DictionaryCacheFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DictionaryCacheFirst
    }

    async fn execute(&self, request: &InterceptedRequest) -> Response {
        let key = request.key();
        let partition = &self.ctx.partitions.resource;

        if let Some(hit) = self.ctx.lookup_in(partition, &key).await {
            tracing::debug!(url = key.url(), "resource cache hit");
            return hit;
        }

        match self.ctx.fetch(request).await {
            Ok(response) => {
                self.ctx.store(partition, &key, response.clone(), true).await;
                response
            }
            Err(e) => {
                tracing::debug!(url = key.url(), error = %e, "resource fetch failed, searching all partitions");
                self.ctx
                    .lookup_any(&key)
                    .await
                    .unwrap_or_else(|| Response::synthesized(503, "Service Unavailable"))
            }
        }
    }
}

/// Network-first for documents, falling back to the cached shell.
///
/// Fresh responses are stored under their exact key, so navigating to the
/// site root refreshes the root shell entry. Offline, the exact entry is
/// preferred, then the root, then `index.html`.
pub struct NavigationNetworkFirst {
    ctx: Arc<StrategyContext>,
}

#[async_trait]
impl Strategy for NavigationNetworkFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NavigationNetworkFirst
    }

    async fn execute(&self, request: &InterceptedRequest) -> Response {
        let key = request.key();
        let partition = &self.ctx.partitions.shell;

        match self.ctx.fetch(request).await {
            Ok(response) => {
                self.ctx.store(partition, &key, response.clone(), false).await;
                response
            }
            Err(e) => {
                tracing::debug!(url = key.url(), error = %e, "navigation offline, serving shell");
                let candidates = [
                    key,
                    RequestKey::get(&self.ctx.config.root_url()),
                    RequestKey::get(&self.ctx.config.index_url()),
                ];
                for candidate in &candidates {
                    if let Some(hit) = self.ctx.lookup_in(partition, candidate).await {
                        return hit;
                    }
                }
                Response::synthesized(503, "Offline")
            }
        }
    }
}

/// Cache-first across all partitions, filling the runtime partition.
pub struct StaticCacheFirst {
    ctx: Arc<StrategyContext>,
}

#[async_trait]
impl Strategy for StaticCacheFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticCacheFirst
    }

    async fn execute(&self, request: &InterceptedRequest) -> Response {
        let key = request.key();

        if let Some(hit) = self.ctx.lookup_any(&key).await {
            tracing::debug!(url = key.url(), "static cache hit");
            return hit;
        }

        match self.ctx.fetch(request).await {
            Ok(response) => {
                self.ctx
                    .store(&self.ctx.partitions.runtime, &key, response.clone(), false)
                    .await;
                response
            }
            Err(e) => {
                tracing::debug!(url = key.url(), error = %e, "static asset unavailable");
                Response::synthesized(404, "Not Found")
            }
        }
    }
}

/// Network-first for everything else, falling back to any partition.
pub struct FallbackNetworkFirst {
    ctx: Arc<StrategyContext>,
}

#[async_trait]
impl Strategy for FallbackNetworkFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FallbackNetworkFirst
    }

    async fn execute(&self, request: &InterceptedRequest) -> Response {
        let key = request.key();

        match self.ctx.fetch(request).await {
            Ok(response) => {
                self.ctx
                    .store(&self.ctx.partitions.runtime, &key, response.clone(), false)
                    .await;
                response
            }
            Err(e) => {
                tracing::debug!(url = key.url(), error = %e, "fetch failed, searching all partitions");
                self.ctx
                    .lookup_any(&key)
                    .await
                    .unwrap_or_else(|| Response::synthesized(503, "Service Unavailable"))
            }
        }
    }
}

/// One executor per [`StrategyKind`].
pub struct Strategies {
    dictionary: DictionaryCacheFirst,
    navigation: NavigationNetworkFirst,
    static_assets: StaticCacheFirst,
    fallback: FallbackNetworkFirst,
}

impl Strategies {
    pub fn new(ctx: Arc<StrategyContext>) -> Self {
        Self {
            dictionary: DictionaryCacheFirst { ctx: Arc::clone(&ctx) },
            navigation: NavigationNetworkFirst { ctx: Arc::clone(&ctx) },
            static_assets: StaticCacheFirst { ctx: Arc::clone(&ctx) },
            fallback: FallbackNetworkFirst { ctx },
        }
    }

    pub fn get(&self, kind: StrategyKind) -> &dyn Strategy {
        match kind {
            StrategyKind::DictionaryCacheFirst => &self.dictionary,
            StrategyKind::NavigationNetworkFirst => &self.navigation,
            StrategyKind::StaticCacheFirst => &self.static_assets,
            StrategyKind::FallbackNetworkFirst => &self.fallback,
        }
    }
}
