//! On-demand precache requests posted by the host application.
//!
//! Messages are fire-and-forget: the outcome exists for logging and
//! diagnostics, and the real effect is a populated resource partition.

use serde::{Deserialize, Serialize};
use shellcache_core::{InterceptedRequest, RequestKey};

use super::strategy::StrategyContext;
use crate::fetch::resolve;

/// A message understood by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Cache `url` into the resource partition.
    PrecacheResource { url: String },
    /// Cache the configured default resource.
    PrecacheDefaultResource,
}

impl WorkerMessage {
    /// Parse a raw message; anything unrecognized yields `None`.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum MessageOutcome {
    /// Already in the resource partition; no fetch was made.
    AlreadyCached { url: String },
    Cached { url: String },
    Failed { url: String, reason: String },
    Ignored { reason: String },
}

/// Handle a raw message.
pub async fn handle(ctx: &StrategyContext, message: &serde_json::Value) -> MessageOutcome {
    let Some(message) = WorkerMessage::parse(message) else {
        tracing::debug!(%message, "ignoring unrecognized message");
        return MessageOutcome::Ignored { reason: "unrecognized message".into() };
    };

    let locator = match message {
        WorkerMessage::PrecacheResource { url } => url,
        WorkerMessage::PrecacheDefaultResource => match &ctx.config.default_resource_url {
            Some(url) => url.clone(),
            None => return MessageOutcome::Ignored { reason: "no default resource configured".into() },
        },
    };

    let url = match resolve(&ctx.config.scope, &locator) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(locator = %locator, error = %e, "ignoring message with bad url");
            return MessageOutcome::Ignored { reason: e.to_string() };
        }
    };

    precache_resource(ctx, InterceptedRequest::get(url)).await
}

async fn precache_resource(ctx: &StrategyContext, request: InterceptedRequest) -> MessageOutcome {
    let key = RequestKey::get(&request.url);
    let url = key.url().to_string();
    let partition = &ctx.partitions.resource;

    if ctx.lookup_in(partition, &key).await.is_some() {
        tracing::debug!(url = %url, "resource already cached");
        return MessageOutcome::AlreadyCached { url };
    }

    match ctx.fetch(&request).await {
        Ok(response) if response.is_ok() => {
            ctx.store(partition, &key, response, true).await;
            tracing::info!(url = %url, "precached resource on demand");
            MessageOutcome::Cached { url }
        }
        Ok(response) => {
            let reason = format!("status {}", response.status);
            tracing::warn!(url = %url, reason = %reason, "on-demand precache failed");
            MessageOutcome::Failed { url, reason }
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "on-demand precache failed");
            MessageOutcome::Failed { url, reason: e.to_string() }
        }
    }
}
