//! Worker lifecycle tools.
//!
//! The host drives the worker through these: `worker_install` and
//! `worker_activate` for the two lifecycle events, `worker_fetch` for an
//! intercepted request, `worker_detach` when a page closes and
//! `worker_message` for application messages.

use chrono::Utc;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::worker::{Classification, StrategyKind};
use shellcache_client::{ActivationReport, Interception, MessageOutcome, Worker, WorkerState, resolve};
use shellcache_core::{Error, InterceptedRequest, RequestMode, ResponseKind};

use crate::tools::json_result;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    pub generation: String,
    /// Shell partition that was populated.
    pub partition: String,
    pub stored: Vec<String>,
    /// URLs that could not be cached, with the reason.
    pub failed: Vec<(String, String)>,
    /// True when every precache entry landed in one transaction.
    pub atomic: bool,
    /// True when every requested entry was stored.
    pub complete: bool,
    /// The host may activate immediately.
    pub skip_waiting: bool,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let outcome = worker.install().await?;
    let report = outcome.report;
    let complete = report.is_complete();
    let output = WorkerInstallOutput {
        generation: worker.generation().to_string(),
        partition: report.partition,
        stored: report.stored,
        failed: report.failed.into_iter().map(|f| (f.url, f.reason)).collect(),
        atomic: report.atomic,
        complete,
        skip_waiting: outcome.skip_waiting,
    };

    json_result(&output)
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerActivateOutput {
    pub generation: String,
    /// Stale partitions that were deleted.
    pub deleted: Vec<String>,
    /// Stale partitions that could not be deleted.
    pub failed: Vec<String>,
    pub claimed_clients: usize,
}

impl From<ActivationReport> for WorkerActivateOutput {
    fn from(report: ActivationReport) -> Self {
        Self {
            generation: report.generation,
            deleted: report.deleted,
            failed: report.failed,
            claimed_clients: report.claimed_clients,
        }
    }
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&WorkerActivateOutput::from(report))
}

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Request URL, absolute or relative to the worker scope.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "cors" (default) or "no-cors".
    #[serde(default)]
    pub mode: RequestMode,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Page issuing the request. Registered with the worker on first sight.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// False when the worker let the request pass through to the host.
    pub handled: bool,
    pub url: String,
    /// Generation controlling `client_id`, if any.
    pub controller: Option<String>,
    /// Caching strategy the router picks; absent for requests it never
    /// intercepts, such as non-GET.
    #[schemars(with = "Option<String>")]
    pub strategy: Option<StrategyKind>,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub kind: Option<ResponseKind>,
    /// Content-Type header of the response.
    pub content_type: Option<String>,
    /// Final response URL, absent for synthesized responses.
    pub response_url: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossy.
    pub body: Option<String>,
    pub body_bytes: usize,
    /// ISO8601 timestamp of when the request was handled.
    pub handled_at: String,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&worker.config().scope, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method must not be empty".into()).into());
    }

    let controller = match &params.client_id {
        Some(id) => worker.attach_client(id).await,
        None => None,
    };

    let mut request = InterceptedRequest::new(params.method.trim(), url.clone()).with_mode(params.mode);
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let strategy = match worker.classify(&request) {
        Classification::Strategy(kind) => Some(kind),
        Classification::Passthrough => None,
    };

    let mut output = WorkerFetchOutput {
        handled: false,
        url: url.to_string(),
        controller,
        strategy,
        status: None,
        status_text: None,
        kind: None,
        content_type: None,
        response_url: None,
        headers: Vec::new(),
        body: None,
        body_bytes: 0,
        handled_at: Utc::now().to_rfc3339(),
    };

    if let Interception::Respond(response) = worker.handle_fetch(&request).await {
        output.handled = true;
        output.status = Some(response.status);
        output.content_type = response.header("content-type").map(str::to_string);
        output.status_text = Some(response.status_text);
        output.kind = Some(response.kind);
        output.response_url = response.url;
        output.body_bytes = response.body.len();
        output.body = Some(String::from_utf8_lossy(&response.body).into_owned());
        output.headers = response.headers;
    }

    json_result(&output)
}

/// Parameters for the worker_detach tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerDetachParams {
    /// Page that was closed.
    pub client_id: String,
}

/// Output from the worker_detach tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerDetachOutput {
    /// False if the page was never attached.
    pub detached: bool,
    /// Pages still open.
    pub open_clients: usize,
}

/// Implementation of the worker_detach tool.
pub async fn detach_impl(worker: &Worker, params: WorkerDetachParams) -> Result<CallToolResult, McpError> {
    let id = params.client_id.trim();
    if id.is_empty() {
        return Err(Error::InvalidInput("client_id must not be empty".into()).into());
    }

    let detached = worker.detach_client(id).await;
    let output = WorkerDetachOutput { detached, open_clients: worker.clients().len().await };
    json_result(&output)
}

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message payload, e.g. `{"kind": "precache-resource", "url": "./words.json"}`.
    pub message: serde_json::Value,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    #[schemars(with = "String")]
    pub state: WorkerState,
    /// Outcome as reported by the worker.
    pub outcome: serde_json::Value,
}

/// Implementation of the worker_message tool.
pub async fn message_impl(worker: &Worker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let outcome: MessageOutcome = worker.handle_message(&params.message).await;
    let output = WorkerMessageOutput {
        state: worker.state().await,
        outcome: serde_json::to_value(&outcome).map_err(crate::error::ToolError::from)?,
    };

    json_result(&output)
}
