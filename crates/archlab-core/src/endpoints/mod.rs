//! Wire contracts for the collaborating backend services.
//!
//! One trait per collaborator, each taking and returning explicit payload
//! structs. Payload shapes are validated at this boundary: a response that
//! does not deserialize is a [`EndpointError::Malformed`] error, never a
//! half-populated value propagating through the session. Concrete transport
//! lives in [`http`]; tests substitute hand-rolled fakes.

pub mod http;

pub use http::{HttpAuditSink, HttpExperimentClient};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DesignDecisionPrediction, TaskAssignment};
use crate::search::types::SearchResult;

/// `result` value a successful search response carries.
pub const SEARCH_STATUS_DONE: &str = "done";

/// Errors shared by all endpoint calls.
#[derive(Debug, Clone, Error)]
pub enum EndpointError {
    /// The backend could not be reached (DNS, connect, timeout, bad URL).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success HTTP status.
    #[error("Upstream returned HTTP {status}")]
    Http { status: u16 },
    /// The backend answered, but the payload did not match its schema.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

// =============================================================================
// Task endpoint
// =============================================================================

/// Request body for the task-assignment endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TasksRequest {
    #[serde(rename = "MtrNo")]
    pub mtr_no: String,
}

/// Fetches a participant's task assignment.
#[async_trait::async_trait]
pub trait TaskEndpoint: Send + Sync {
    async fn fetch_tasks(&self, request: &TasksRequest) -> Result<TaskAssignment, EndpointError>;
}

// =============================================================================
// Rewrite endpoint
// =============================================================================

/// Request body for the language-model query rewrite.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteRequest {
    pub prompt: String,
}

/// Rewrite response; `answer` is absent when the model produced nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

/// Rewrites a raw participant query into a refined one.
#[async_trait::async_trait]
pub trait RewriteEndpoint: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewriteResponse, EndpointError>;
}

// =============================================================================
// Search endpoint
// =============================================================================

/// Design decision prediction triple sent with every retrieval request.
///
/// All-null (the [`Default`]) unless the task runs the reranking engine, in
/// which case the triple comes from the question's stored design decision
/// data.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Predictions {
    pub existence: Option<String>,
    pub executive: Option<String>,
    pub property: Option<String>,
}

impl Predictions {
    /// Triple from a question's design decision data, absent parts null.
    pub fn from_design_decision(decision: Option<&DesignDecisionPrediction>) -> Self {
        match decision {
            Some(d) => Self {
                existence: d.existence.clone(),
                executive: d.executive.clone(),
                property: d.property.clone(),
            },
            None => Self::default(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.existence.is_none() && self.executive.is_none() && self.property.is_none()
    }
}

/// Request body for the search engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub database_url: String,
    pub model_id: String,
    pub version_id: String,
    /// Corpus scope: repository URL to the project keys searched within it.
    pub repos_and_projects: BTreeMap<String, Vec<String>>,
    pub query: String,
    pub num_results: usize,
    pub predictions: Predictions,
}

/// Search engine response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Backend status; anything but [`SEARCH_STATUS_DONE`] is a failure.
    pub result: String,
    #[serde(default)]
    pub payload: Vec<SearchResult>,
}

impl SearchResponse {
    pub fn is_done(&self) -> bool {
        self.result == SEARCH_STATUS_DONE
    }
}

/// Runs a retrieval request against the issue corpus.
#[async_trait::async_trait]
pub trait SearchEndpoint: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EndpointError>;
}

// =============================================================================
// Submission endpoint
// =============================================================================

/// One rated result, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPayload {
    pub issue_id: i64,
    pub rating: String,
}

/// Request body for posting a question's completed ratings.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRequest {
    #[serde(rename = "matriculationNumber")]
    pub matriculation_number: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "questionKey")]
    pub question_key: String,
    #[serde(rename = "searchQuery")]
    pub search_query: String,
    pub ratings: Vec<RatingPayload>,
}

/// Submission acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default)]
    pub success: bool,
}

/// Persists a completed rating set server-side.
#[async_trait::async_trait]
pub trait SubmissionEndpoint: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResponse, EndpointError>;
}

// =============================================================================
// Log endpoint
// =============================================================================

/// Wire form of an audit event.
#[derive(Debug, Clone, Serialize)]
pub struct LogRequest {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}
