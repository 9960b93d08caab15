//! Network side of the worker.
//!
//! [`Network`] is the seam every strategy fetches through. [`FetchClient`]
//! implements it over reqwest and classifies each response the way a browser
//! would:
//!
//! - same origin as the worker scope: `basic`
//! - cross-origin from a `no-cors` request: `opaque`
//! - any other cross-origin response: `cors`
//!
//! Only transport failures are errors. A 404 or 500 is a successful fetch of
//! an unsuccessful response, and the strategy decides what to do with it.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use shellcache_core::locator::{UrlError, resolve};

use shellcache_core::{Error, InterceptedRequest, RequestMode, Response, ResponseKind};

/// Something that can turn a request into a response over the network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request.
    ///
    /// # Errors
    ///
    /// Returns `Error::Network` when no response could be obtained at all.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 50MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,

    /// Worker scope; its origin decides which responses are `basic`.
    pub scope: ::url::Url,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 10,
            scope: ::url::Url::parse("http://localhost/").expect("static scope URL is valid"),
        }
    }
}

/// Classify a response by where it came from and how it was requested.
pub fn response_kind(scope: &::url::Url, request: &InterceptedRequest, final_url: &::url::Url) -> ResponseKind {
    if final_url.origin() == scope.origin() {
        ResponseKind::Basic
    } else if request.mode == RequestMode::NoCors {
        ResponseKind::Opaque
    } else {
        ResponseKind::Cors
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {:?}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        if let Some(accept) = &request.accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out fetching {}", request.url))
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        let kind = response_kind(&self.config.scope, request, &final_url);

        tracing::debug!(
            "fetched {} -> {} ({} {}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            kind,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response {
            url: Some(final_url.to_string()),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            kind,
        })
    }
}
