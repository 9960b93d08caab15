//! Intercepted request model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::RequestKey;

/// How the client issued the request.
///
/// Mirrors the fetch modes a host runtime reports. Cross-origin responses to
/// `NoCors` requests come back opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// A request observed by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    /// Raw `Accept` header, if the client sent one.
    pub accept: Option<String>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url, mode: RequestMode::default(), accept: None }
    }

    /// A plain GET, the only method that participates in caching.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A GET issued as a top-level navigation.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_accept("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the `Accept` header asks for an HTML document.
    pub fn accepts_document(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.to_ascii_lowercase().contains("text/html"))
    }

    /// Cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}
