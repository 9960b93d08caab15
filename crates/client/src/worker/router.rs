//! Request classification.
//!
//! The router is an ordered list of `(Rule, StrategyKind)` pairs and the
//! first matching rule wins. Non-GET requests never reach the list. The
//! order matters in two places: the large-resource rule precedes the
//! same-origin rule so a same-origin dictionary is still served from the
//! resource partition, and the document rule precedes the same-origin rule
//! so page loads always prefer freshness.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use shellcache_core::{ConfigError, InterceptedRequest, WorkerConfig};

/// Caching policy applied to a request class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    DictionaryCacheFirst,
    NavigationNetworkFirst,
    StaticCacheFirst,
    FallbackNetworkFirst,
}

/// Predicate half of a routing pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// URL matches the configured large-resource pattern.
    LargeResource,
    /// Navigation, or an `Accept` header asking for HTML.
    Document,
    /// Same origin as the worker scope.
    SameOrigin,
    Any,
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    Strategy(StrategyKind),
}

pub struct Router {
    config: Arc<WorkerConfig>,
    resource_pattern: Regex,
    rules: Vec<(Rule, StrategyKind)>,
}

impl Router {
    /// Build the router with the standard rule order.
    pub fn new(config: Arc<WorkerConfig>) -> Result<Self, ConfigError> {
        let resource_pattern = config.resource_regex()?;
        Ok(Self {
            config,
            resource_pattern,
            rules: vec![
                (Rule::LargeResource, StrategyKind::DictionaryCacheFirst),
                (Rule::Document, StrategyKind::NavigationNetworkFirst),
                (Rule::SameOrigin, StrategyKind::StaticCacheFirst),
                (Rule::Any, StrategyKind::FallbackNetworkFirst),
            ],
        })
    }

    /// The routing table, in evaluation order.
    pub fn rules(&self) -> &[(Rule, StrategyKind)] {
        &self.rules
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Classification {
        if !request.is_get() {
            return Classification::Passthrough;
        }

        self.rules
            .iter()
            .find(|(rule, _)| self.matches(*rule, request))
            .map(|(_, kind)| Classification::Strategy(*kind))
            .unwrap_or(Classification::Passthrough)
    }

    fn matches(&self, rule: Rule, request: &InterceptedRequest) -> bool {
        match rule {
            Rule::LargeResource => self.resource_pattern.is_match(request.url.as_str()),
            Rule::Document => request.is_navigation() || request.accepts_document(),
            Rule::SameOrigin => self.config.is_same_origin(&request.url),
            Rule::Any => true,
        }
    }
}
