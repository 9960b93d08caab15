//! Install-time precaching of the shell partition.
//!
//! The whole list is fetched first and written in one transaction when every
//! entry came back OK. Otherwise each successful entry is written on its own,
//! so one broken URL never costs the rest of the list. Install fails only
//! when nothing at all could be stored.

use serde::Serialize;
use shellcache_core::{Error, InterceptedRequest, RequestKey, RequestMode, Response};
use url::Url;

use super::strategy::StrategyContext;

/// One precache entry that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

/// What an install managed to cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrecacheReport {
    pub partition: String,
    pub requested: Vec<String>,
    pub stored: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
    /// True when the whole list was written as one unit.
    pub atomic: bool,
}

impl PrecacheReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.stored.len() == self.requested.len()
    }
}

fn precache_request(ctx: &StrategyContext, url: &Url) -> InterceptedRequest {
    let mode = if ctx.config.is_same_origin(url) { RequestMode::SameOrigin } else { RequestMode::Cors };
    InterceptedRequest::get(url.clone()).with_mode(mode)
}

async fn fetch_entry(ctx: &StrategyContext, url: &Url) -> Result<Response, String> {
    let request = precache_request(ctx, url);
    match ctx.fetch(&request).await {
        Ok(response) if response.is_ok() => Ok(response),
        Ok(response) => Err(format!("status {}", response.status)),
        Err(e) => Err(e.to_string()),
    }
}

/// Populate `partition` with every URL in `urls`.
///
/// # Errors
///
/// Returns `Error::PrecacheFailed` when the list is non-empty and not a single
/// entry could be stored, and propagates a failure to open the partition.
pub async fn run(ctx: &StrategyContext, partition: &str, urls: &[Url]) -> Result<PrecacheReport, Error> {
    let target = ctx.db.open_partition(partition).await?;
    let mut report = PrecacheReport {
        partition: partition.to_string(),
        requested: urls.iter().map(|u| u.to_string()).collect(),
        ..Default::default()
    };

    let mut fetched = Vec::with_capacity(urls.len());
    for url in urls {
        fetched.push((url, fetch_entry(ctx, url).await));
    }

    if fetched.iter().all(|(_, result)| result.is_ok()) {
        let entries: Vec<(RequestKey, Response)> = fetched
            .iter()
            .filter_map(|(url, result)| result.as_ref().ok().map(|r| (RequestKey::get(url), r.clone())))
            .collect();

        match ctx.db.put_all(&target, &entries).await {
            Ok(()) => {
                report.stored = report.requested.clone();
                report.atomic = true;
                tracing::info!(partition, entries = entries.len(), "precached shell");
                return Ok(report);
            }
            Err(e) => tracing::warn!(partition, error = %e, "atomic precache rejected, caching entries individually"),
        }
    } else {
        tracing::warn!(partition, "precache list incomplete, caching entries individually");
    }

    for (url, result) in fetched {
        let outcome = match result {
            Ok(response) => ctx
                .db
                .put(&target, &RequestKey::get(url), &response)
                .await
                .map_err(|e| e.to_string()),
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(()) => report.stored.push(url.to_string()),
            Err(reason) => {
                tracing::warn!(partition, url = %url, reason = %reason, "precache entry skipped");
                report.failed.push(PrecacheFailure { url: url.to_string(), reason });
            }
        }
    }

    if !urls.is_empty() && report.stored.is_empty() {
        return Err(Error::PrecacheFailed(format!(
            "none of {} entries could be cached into {}",
            urls.len(),
            partition
        )));
    }

    tracing::info!(
        partition,
        stored = report.stored.len(),
        failed = report.failed.len(),
        "precached shell with failures"
    );
    Ok(report)
}
