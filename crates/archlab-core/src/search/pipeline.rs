//! Query pipeline orchestrating rewrite and retrieval.
//!
//! One `execute` call is at most two network round trips: an optional
//! language-model rewrite of the raw query, then the retrieval request. The
//! pipeline decides what to send where; it never touches display state, so a
//! caller is free to race several executions and apply only the newest one
//! through the rating tracker's generation guard.
//!
//! Every transition is recorded on the injected audit sink with full
//! participant/task/question context. The audit trail is the experiment's
//! primary record of what each participant actually searched for.

use std::sync::Arc;

use tracing::debug;

use crate::audit::{AuditScope, AuditSink};
use crate::config::{self, ConnectionSettings};
use crate::endpoints::{
    Predictions, RewriteEndpoint, RewriteRequest, SearchEndpoint, SearchRequest,
};
use crate::error::SearchError;
use crate::model::{ParticipantId, Question, Task};

use super::types::SearchOutcome;

/// Executes participant queries against the retrieval backends.
pub struct QueryPipeline {
    rewrite: Arc<dyn RewriteEndpoint>,
    search: Arc<dyn SearchEndpoint>,
    audit: Arc<dyn AuditSink>,
    settings: ConnectionSettings,
}

impl QueryPipeline {
    pub fn new(
        rewrite: Arc<dyn RewriteEndpoint>,
        search: Arc<dyn SearchEndpoint>,
        audit: Arc<dyn AuditSink>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            rewrite,
            search,
            audit,
            settings,
        }
    }

    /// Runs one query for a question.
    ///
    /// Steps:
    /// 1. Reject an empty query locally.
    /// 2. If the task enables rewriting, ask the rewrite backend; without an
    ///    `answer` the pipeline stops and no retrieval request is sent.
    /// 3. Build the prediction triple (all-null unless the task reranks).
    /// 4. Dispatch the retrieval request and hand back the ordered results;
    ///    an empty payload is a valid, explicitly empty outcome.
    pub async fn execute(
        &self,
        participant: &ParticipantId,
        task: &Task,
        question_key: &str,
        question: &Question,
        raw_query: &str,
    ) -> Result<SearchOutcome, SearchError> {
        let scope = AuditScope::new(
            self.audit.clone(),
            participant.as_str(),
            &task.name,
            question_key,
        );

        let raw_query = raw_query.trim();
        if raw_query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let effective_query = if task.gpt {
            self.rewrite_query(&scope, raw_query).await?
        } else {
            raw_query.to_string()
        };

        let predictions = if task.rerank_engine {
            Predictions::from_design_decision(question.design_decision.as_ref())
        } else {
            Predictions::default()
        };

        scope.info(format!(
            "search requested {} reranking, query \"{}\"",
            if task.rerank_engine { "with" } else { "without" },
            effective_query
        ));

        let request = SearchRequest {
            database_url: self.settings.database_url.clone(),
            model_id: config::MODEL_ID.to_string(),
            version_id: config::VERSION_ID.to_string(),
            repos_and_projects: config::corpus_scope(),
            query: effective_query.clone(),
            num_results: config::SEARCH_RESULT_LIMIT,
            predictions,
        };

        debug!(query = %effective_query, "dispatching retrieval request");
        let response = match self.search.search(&request).await {
            Ok(response) => response,
            Err(e) => {
                scope.error(format!("search call failed: {}", e));
                return Err(e.into());
            }
        };

        if !response.is_done() {
            scope.error(format!(
                "search backend reported status \"{}\"",
                response.result
            ));
            return Err(SearchError::Rejected(response.result));
        }

        if response.payload.is_empty() {
            scope.warning("search returned no results");
        } else {
            scope.info(format!("search returned {} results", response.payload.len()));
        }

        Ok(SearchOutcome {
            effective_query,
            results: response.payload,
        })
    }

    async fn rewrite_query(
        &self,
        scope: &AuditScope,
        raw_query: &str,
    ) -> Result<String, SearchError> {
        scope.info(format!("rewrite requested for query \"{}\"", raw_query));

        let request = RewriteRequest {
            prompt: raw_query.to_string(),
        };
        let response = match self.rewrite.rewrite(&request).await {
            Ok(response) => response,
            Err(e) => {
                scope.error(format!("rewrite call failed: {}", e));
                return Err(SearchError::RewriteFailed {
                    reason: e.to_string(),
                });
            }
        };

        match response.answer {
            Some(answer) if !answer.trim().is_empty() => {
                scope.info(format!("rewrite produced \"{}\"", answer));
                Ok(answer)
            }
            _ => {
                scope.error("rewrite returned no answer");
                Err(SearchError::RewriteFailed {
                    reason: "no answer returned".to_string(),
                })
            }
        }
    }
}
