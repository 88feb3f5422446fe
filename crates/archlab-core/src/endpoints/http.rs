//! HTTP implementations of the endpoint contracts.
//!
//! All calls go through one pooled client; connection reuse matters because
//! a participant session issues many small requests against the same hosts.
//! Which base URL serves which contract comes from [`ConnectionSettings`]:
//! task assignment, submission, and the audit log live on the issue database
//! API, query rewriting on the RAG service, retrieval on the search engine.

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::audit::{AuditEvent, AuditSink};
use crate::config::ConnectionSettings;
use crate::model::TaskAssignment;

use super::{
    EndpointError, LogRequest, RewriteEndpoint, RewriteRequest, RewriteResponse, SearchEndpoint,
    SearchRequest, SearchResponse, SubmissionEndpoint, SubmissionRequest, SubmissionResponse,
    TaskEndpoint, TasksRequest,
};

/// Global HTTP client for connection pooling.
///
/// Configured with a 30 second per-request timeout and a user agent
/// identifying the experiment client.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("archlab/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

fn endpoint_url(base: &str, path: &str) -> Result<Url, EndpointError> {
    Url::parse(&format!("{}/{}", base.trim_end_matches('/'), path))
        .map_err(|e| EndpointError::Transport(format!("invalid endpoint URL: {}", e)))
}

async fn post_json<Req, Resp>(url: Url, body: &Req) -> Result<Resp, EndpointError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = HTTP_CLIENT
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| EndpointError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EndpointError::Http {
            status: status.as_u16(),
        });
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| EndpointError::Malformed(e.to_string()))
}

/// Endpoint implementations over the configured backend URLs.
///
/// One value implements all four request/response contracts; hand the same
/// instance (via `Arc`) to every component that needs a backend.
pub struct HttpExperimentClient {
    settings: ConnectionSettings,
}

impl HttpExperimentClient {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl TaskEndpoint for HttpExperimentClient {
    async fn fetch_tasks(&self, request: &TasksRequest) -> Result<TaskAssignment, EndpointError> {
        let url = endpoint_url(&self.settings.database_url, "tasks")?;
        post_json(url, request).await
    }
}

#[async_trait::async_trait]
impl RewriteEndpoint for HttpExperimentClient {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewriteResponse, EndpointError> {
        let url = endpoint_url(&self.settings.arch_rag_url, "rewrite")?;
        post_json(url, request).await
    }
}

#[async_trait::async_trait]
impl SearchEndpoint for HttpExperimentClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EndpointError> {
        let url = endpoint_url(&self.settings.search_engine_url, "search")?;
        post_json(url, request).await
    }
}

#[async_trait::async_trait]
impl SubmissionEndpoint for HttpExperimentClient {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse, EndpointError> {
        let url = endpoint_url(&self.settings.database_url, "solutions")?;
        post_json(url, request).await
    }
}

/// Audit sink posting events to the log endpoint.
///
/// Delivery is fire-and-forget on a spawned task: the participant's flow is
/// never blocked on the log backend, and a failed delivery is only a
/// diagnostic. Must be constructed inside a tokio runtime.
pub struct HttpAuditSink {
    log_url: Option<Url>,
}

impl HttpAuditSink {
    pub fn new(settings: &ConnectionSettings) -> Self {
        let log_url = endpoint_url(&settings.database_url, "log").ok();
        if log_url.is_none() {
            tracing::warn!("audit log endpoint URL is invalid; events will be dropped");
        }
        Self { log_url }
    }
}

impl AuditSink for HttpAuditSink {
    fn emit(&self, event: AuditEvent) {
        let Some(url) = self.log_url.clone() else {
            return;
        };
        let request = LogRequest {
            level: event.level.as_str().to_string(),
            message: format!(
                "[participant {} | task {} | question {}] {}",
                event.participant, event.task, event.question, event.message
            ),
            timestamp: event.timestamp.to_rfc3339(),
        };
        tokio::spawn(async move {
            if let Err(e) = post_json::<_, serde_json::Value>(url, &request).await {
                tracing::debug!("audit event delivery failed: {}", e);
            }
        });
    }
}
