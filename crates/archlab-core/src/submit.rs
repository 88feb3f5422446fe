//! Completeness-gated rating submission.
//!
//! Ratings are the experiment's primary data, so the guard enforces the one
//! integrity rule that matters before anything leaves the client: every
//! displayed result has a rating and there is at least one result. The
//! submission itself happens at most once per call; nothing is retried, and
//! the tracker is left untouched so the caller decides what a successful
//! submission means for navigation.

use std::sync::Arc;

use tracing::debug;

use crate::audit::{AuditScope, AuditSink};
use crate::endpoints::{SubmissionEndpoint, SubmissionRequest};
use crate::error::SubmitError;
use crate::model::ParticipantId;
use crate::rating::RatingTracker;

/// Packages and submits a question's completed ratings.
pub struct SubmissionGuard {
    endpoint: Arc<dyn SubmissionEndpoint>,
    audit: Arc<dyn AuditSink>,
}

impl SubmissionGuard {
    pub fn new(endpoint: Arc<dyn SubmissionEndpoint>, audit: Arc<dyn AuditSink>) -> Self {
        Self { endpoint, audit }
    }

    /// Submits the tracker's ratings for one question.
    ///
    /// Fails locally with [`SubmitError::RatingsIncomplete`] before any
    /// network call when the tracker is not complete. On upstream failure
    /// the ratings stay in place and the participant re-triggers submission
    /// manually.
    pub async fn submit(
        &self,
        participant: &ParticipantId,
        task_name: &str,
        question_key: &str,
        query: &str,
        tracker: &RatingTracker,
    ) -> Result<(), SubmitError> {
        if !tracker.is_complete() {
            return Err(SubmitError::RatingsIncomplete);
        }

        let scope = AuditScope::new(
            self.audit.clone(),
            participant.as_str(),
            task_name,
            question_key,
        );

        let ratings = tracker.ordered_ratings();
        // Rendered once: the succeeded/failed events both carry the payload
        // for the post-hoc audit.
        let payload = serde_json::to_string(&ratings).unwrap_or_default();

        scope.info(format!(
            "submission started for query \"{}\" with {} ratings",
            query,
            ratings.len()
        ));

        let request = SubmissionRequest {
            matriculation_number: participant.as_str().to_string(),
            task_id: task_name.to_string(),
            question_key: question_key.to_string(),
            search_query: query.to_string(),
            ratings,
        };

        debug!(task = task_name, question = question_key, "posting submission");
        match self.endpoint.submit(&request).await {
            Ok(response) if response.success => {
                scope.info(format!("submission succeeded: {}", payload));
                Ok(())
            }
            Ok(_) => {
                scope.error(format!("submission failed (rejected): {}", payload));
                Err(SubmitError::Rejected)
            }
            Err(e) => {
                scope.error(format!("submission failed ({}): {}", e, payload));
                Err(e.into())
            }
        }
    }
}
