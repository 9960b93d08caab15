//! Scripted network for worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use shellcache_core::{Error, InterceptedRequest, Response};
use url::Url;

use crate::fetch::{Network, response_kind};

pub(crate) const SCOPE: &str = "http://localhost/";

enum Reply {
    Respond(u16, &'static str),
    Fail,
}

/// Replies by exact URL; unknown URLs fail like an unreachable host.
pub(crate) struct MockNetwork {
    scope: Url,
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
    offline: AtomicBool,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self {
            scope: Url::parse(SCOPE).unwrap(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            total: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub(crate) fn respond(self, url: &str, status: u16, body: &'static str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond(status, body));
        self
    }

    pub(crate) fn fail(self, url: &str) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
        self
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }

        let replies = self.replies.lock().unwrap();
        match replies.get(request.url.as_str()) {
            Some(Reply::Respond(status, body)) => Ok(Response::new(*status, *body)
                .with_url(request.url.as_str())
                .with_kind(response_kind(&self.scope, request, &request.url))),
            Some(Reply::Fail) | None => Err(Error::Network(format!("unreachable: {}", request.url))),
        }
    }
}

pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
