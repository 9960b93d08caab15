//! Response snapshots returned to clients and stored in partitions.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Response type as a host runtime classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseKind {
    /// Same-origin response with observable contents.
    Basic,
    /// Cross-origin response that passed CORS.
    Cors,
    /// Cross-origin `no-cors` response; contents are not inspectable by the page.
    Opaque,
    OpaqueRedirect,
    Error,
    /// Synthesized by the worker itself.
    Default,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::OpaqueRedirect => "opaque-redirect",
            ResponseKind::Error => "error",
            ResponseKind::Default => "default",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "cors" => Ok(ResponseKind::Cors),
            "opaque" => Ok(ResponseKind::Opaque),
            "opaque-redirect" => Ok(ResponseKind::OpaqueRedirect),
            "error" => Ok(ResponseKind::Error),
            "default" => Ok(ResponseKind::Default),
            other => Err(format!("unknown response kind: {other}")),
        }
    }
}

/// A complete response: status line, headers and body.
///
/// Cloning is cheap since the body is reference-counted, so the caching path
/// always works on its own clone and never competes with the copy returned
/// to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL the response came from, if known.
    pub url: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: None,
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// An empty-bodied response produced by the worker instead of the network.
    pub fn synthesized(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            url: None,
            status,
            status_text: status_text.into(),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::new(),
            kind: ResponseKind::Default,
        }
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
