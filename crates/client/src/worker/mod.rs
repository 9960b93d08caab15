//! The request-routing worker.
//!
//! A [`Worker`] is one cache generation. The host drives it through four
//! events:
//!
//! - `install`: precache the shell partition
//! - `activate`: reap stale generations and claim open clients
//! - `handle_fetch`: answer an intercepted request through the router
//! - `handle_message`: on-demand precache requests from the application
//!
//! Install must finish before activate, and activation must finish before the
//! worker answers requests. Until then every request passes through to the
//! host.

pub mod channel;
pub mod clients;
pub mod precache;
pub mod reaper;
pub mod router;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shellcache_core::{CacheDb, ConfigError, Error, InterceptedRequest, Response, WorkerConfig};
use tokio::sync::Mutex;

use crate::fetch::Network;

pub use channel::{MessageOutcome, WorkerMessage};
pub use clients::ClientRegistry;
pub use precache::{PrecacheFailure, PrecacheReport};
pub use reaper::ActivationReport;
pub use router::{Classification, Router, Rule, StrategyKind};
pub use strategy::{Strategies, Strategy, StrategyContext, is_cacheable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this generation will never activate.
    Redundant,
}

/// How the worker disposed of an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not handled; the host performs the request itself.
    Passthrough,
    Respond(Response),
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub report: PrecacheReport,
    /// The host may activate immediately instead of waiting for old clients.
    pub skip_waiting: bool,
}

pub struct Worker {
    config: Arc<WorkerConfig>,
    ctx: Arc<StrategyContext>,
    router: Router,
    strategies: Strategies,
    clients: ClientRegistry,
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Build a worker for the generation described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the worker section does not validate.
    pub fn new(
        config: WorkerConfig, db: CacheDb, network: Arc<dyn Network>, clients: ClientRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let ctx = Arc::new(StrategyContext::new(db, network, Arc::clone(&config)));
        let router = Router::new(Arc::clone(&config))?;
        let strategies = Strategies::new(Arc::clone(&ctx));

        Ok(Self { config, ctx, router, strategies, clients, state: Mutex::new(WorkerState::Parsed) })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn db(&self) -> &CacheDb {
        self.ctx.db()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if *state != from {
            return Err(Error::Lifecycle(format!(
                "cannot move generation {} to {:?} from {:?}",
                self.config.generation, to, *state
            )));
        }
        tracing::info!(generation = %self.config.generation, from = ?from, to = ?to, "worker state change");
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.lock().await = to;
    }

    /// Install event: populate the shell partition from the precache list.
    ///
    /// # Errors
    ///
    /// Returns `Error::Lifecycle` unless the worker is freshly parsed, and
    /// `Error::PrecacheFailed` (leaving the worker redundant) when nothing
    /// could be cached.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;

        let result = match self.config.precache_urls() {
            Ok(urls) => precache::run(&self.ctx, &self.ctx.partitions().shell, &urls).await,
            Err(e) => Err(Error::InvalidInput(e.to_string())),
        };

        match result {
            Ok(report) => {
                self.set_state(WorkerState::Installed).await;
                Ok(InstallOutcome { report, skip_waiting: self.config.skip_waiting })
            }
            Err(e) => {
                tracing::warn!(generation = %self.config.generation, error = %e, "install failed");
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Activate event: reap stale partitions, then claim every open client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Lifecycle` unless the worker is installed.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;
        let report = reaper::run(self.db(), &self.clients, &self.config.generation, &self.config.whitelist()).await;
        self.set_state(WorkerState::Activated).await;
        Ok(report)
    }

    /// Register a page; an active worker takes control of it if nobody has.
    ///
    /// Returns the generation controlling the page afterwards.
    pub async fn attach_client(&self, id: &str) -> Option<String> {
        self.clients.register(id).await;
        if self.state().await == WorkerState::Activated && self.clients.adopt(id, &self.config.generation).await {
            tracing::debug!(client = %id, generation = %self.config.generation, "adopted client");
        }
        self.clients.controller(id).await
    }

    /// Forget a closed page so later claims no longer count it.
    ///
    /// Returns false if the page was never attached.
    pub async fn detach_client(&self, id: &str) -> bool {
        let removed = self.clients.remove(id).await;
        if removed {
            tracing::debug!(client = %id, "detached client");
            if self.clients.is_empty().await {
                tracing::debug!(generation = %self.config.generation, "no open clients left");
            }
        }
        removed
    }

    /// Pure routing decision for `request`.
    pub fn classify(&self, request: &InterceptedRequest) -> Classification {
        self.router.classify(request)
    }

    /// Fetch event.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Interception {
        let state = self.state().await;
        if state != WorkerState::Activated {
            tracing::debug!(url = %request.url, state = ?state, "worker not active, passing through");
            return Interception::Passthrough;
        }

        match self.classify(request) {
            Classification::Passthrough => Interception::Passthrough,
            Classification::Strategy(kind) => {
                tracing::debug!(url = %request.url, strategy = ?kind, "routing request");
                Interception::Respond(self.strategies.get(kind).execute(request).await)
            }
        }
    }

    /// Message event.
    pub async fn handle_message(&self, message: &serde_json::Value) -> MessageOutcome {
        if self.state().await == WorkerState::Redundant {
            return MessageOutcome::Ignored { reason: "worker is redundant".into() };
        }
        channel::handle(&self.ctx, message).await
    }
}
