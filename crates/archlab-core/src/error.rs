//! Error types for the experiment session components.
//!
//! Each component has its own failure domain; the variants here mirror the
//! states the participant can actually end up in. Validation errors
//! (empty query, incomplete ratings) are rejected locally and never reach
//! the network; upstream failures carry the [`EndpointError`] detail for
//! diagnostics while the user-facing message stays generic.

use thiserror::Error;

use crate::endpoints::EndpointError;
use crate::rating::RatingError;
use crate::store::StoreError;

/// Errors from fetching a participant's task assignment.
///
/// On any of these the previously cached assignment (if any) remains the
/// active one; no retry is attempted automatically.
#[derive(Debug, Error)]
pub enum TaskFetchError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("Session cache error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from executing the query pipeline.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Empty query, rejected locally before any network call.
    #[error("Please enter a search query")]
    EmptyQuery,
    /// The rewrite backend failed or produced no answer; retrieval was not
    /// attempted.
    #[error("Query rewrite failed: {reason}")]
    RewriteFailed { reason: String },
    /// The search backend answered with a non-success status word.
    #[error("Search backend rejected the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    /// A newer search was issued before this one completed; its result was
    /// discarded and must not be surfaced.
    #[error("Superseded by a newer search")]
    Superseded,
}

impl SearchError {
    /// Message shown to the participant, if any.
    ///
    /// Superseded runs are silently discarded, everything upstream collapses
    /// to one generic retryable message.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            SearchError::EmptyQuery => Some("Please enter a search query."),
            SearchError::RewriteFailed { .. }
            | SearchError::Rejected(_)
            | SearchError::Endpoint(_) => {
                Some("An error occurred while fetching search results.")
            }
            SearchError::Superseded => None,
        }
    }
}

/// Errors from submitting a completed rating set.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Not every displayed result has a rating; rejected locally with no
    /// network call.
    #[error("Please rate every result before submitting")]
    RatingsIncomplete,
    /// The server acknowledged the request but did not accept it.
    #[error("Submission rejected by the server")]
    Rejected,
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl SubmitError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmitError::RatingsIncomplete => "Please rate every result before submitting.",
            SubmitError::Rejected | SubmitError::Endpoint(_) => {
                "An error occurred while submitting the ratings."
            }
        }
    }
}

/// Errors from the high-level experiment session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No participant set; fetch a task assignment first")]
    NoParticipant,
    #[error("No task assignment loaded")]
    NoAssignment,
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Unknown question {question} in task {task}")]
    UnknownQuestion { task: String, question: String },
    #[error("No question is currently open")]
    NoActiveQuestion,
    #[error(transparent)]
    TaskFetch(#[from] TaskFetchError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error("Session cache error: {0}")]
    Store(#[from] StoreError),
}
