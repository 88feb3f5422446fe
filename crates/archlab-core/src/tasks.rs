//! Task assignment fetching with change detection.
//!
//! The assignment is fetched every time the participant (re)enters the
//! experiment, but dependents only care when it actually changed: refetching
//! an identical payload must not re-render the task list or re-announce a
//! successful fetch. The resolver compares the fetched payload structurally
//! against the cached session and persists only on difference.

use std::sync::Arc;

use tracing::{debug, info};

use crate::endpoints::{TaskEndpoint, TasksRequest};
use crate::error::TaskFetchError;
use crate::model::{ParticipantId, StoredSession, TaskAssignment};
use crate::store::{SessionStore, SessionStoreExt};

/// Result of a task fetch, distinguishing first/changed fetches from
/// refetches of identical data.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// First fetch for this participant, or the payload changed: the cache
    /// was updated and dependents should be notified (once).
    Updated(TaskAssignment),
    /// The payload is structurally identical to the cached assignment; the
    /// cache was left untouched.
    Unchanged(TaskAssignment),
}

impl FetchOutcome {
    pub fn assignment(&self) -> &TaskAssignment {
        match self {
            FetchOutcome::Updated(assignment) | FetchOutcome::Unchanged(assignment) => assignment,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, FetchOutcome::Updated(_))
    }
}

/// Retrieves and caches a participant's task assignment.
pub struct TaskResolver {
    endpoint: Arc<dyn TaskEndpoint>,
    store: Arc<dyn SessionStore>,
}

impl TaskResolver {
    pub fn new(endpoint: Arc<dyn TaskEndpoint>, store: Arc<dyn SessionStore>) -> Self {
        Self { endpoint, store }
    }

    /// Fetches the assignment for `mtr_no` and reconciles it with the cache.
    ///
    /// On network failure or a malformed payload the error is surfaced to
    /// the caller and the previously cached assignment (if any) remains the
    /// active one; nothing is retried automatically.
    pub async fn fetch_tasks(
        &self,
        mtr_no: &ParticipantId,
    ) -> Result<FetchOutcome, TaskFetchError> {
        let request = TasksRequest {
            mtr_no: mtr_no.as_str().to_string(),
        };
        let fetched = self.endpoint.fetch_tasks(&request).await?;

        let cached = self.store.load_session().await?;
        let unchanged = cached
            .as_ref()
            .is_some_and(|session| session.participant == *mtr_no && session.tasks == fetched);

        if unchanged {
            debug!(participant = %mtr_no, "task assignment unchanged");
            return Ok(FetchOutcome::Unchanged(fetched));
        }

        let session = StoredSession {
            participant: mtr_no.clone(),
            tasks: fetched.clone(),
        };
        self.store.save_session(&session).await?;
        info!(
            participant = %mtr_no,
            tasks = fetched.len(),
            "task assignment fetched"
        );
        Ok(FetchOutcome::Updated(fetched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::EndpointError;
    use crate::model::Task;
    use crate::store::InMemorySessionStore;
    use std::sync::Mutex;

    struct FakeTasks {
        responses: Mutex<Vec<Result<TaskAssignment, EndpointError>>>,
    }

    impl FakeTasks {
        fn with(responses: Vec<Result<TaskAssignment, EndpointError>>) -> Self {
            // Popped back-to-front
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl TaskEndpoint for FakeTasks {
        async fn fetch_tasks(
            &self,
            _request: &TasksRequest,
        ) -> Result<TaskAssignment, EndpointError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .expect("unexpected task fetch")
        }
    }

    fn assignment(description: &str) -> TaskAssignment {
        TaskAssignment::new(vec![Task {
            name: "T1".into(),
            description: description.into(),
            task_details: String::new(),
            questions: Default::default(),
            gpt: false,
            rerank_engine: false,
            scale: Default::default(),
            solutions: Default::default(),
        }])
    }

    #[tokio::test]
    async fn first_fetch_persists_and_reports_updated() {
        let store = Arc::new(InMemorySessionStore::new());
        let endpoint = Arc::new(FakeTasks::with(vec![Ok(assignment("caching"))]));
        let resolver = TaskResolver::new(endpoint, store.clone());

        let outcome = resolver
            .fetch_tasks(&ParticipantId::new("M123"))
            .await
            .unwrap();
        assert!(outcome.is_updated());

        let cached = store.load_session().await.unwrap().unwrap();
        assert_eq!(cached.participant, ParticipantId::new("M123"));
        assert_eq!(cached.tasks, *outcome.assignment());
    }

    #[tokio::test]
    async fn identical_refetch_reports_unchanged_and_keeps_cache() {
        let store = Arc::new(InMemorySessionStore::new());
        let endpoint = Arc::new(FakeTasks::with(vec![
            Ok(assignment("caching")),
            Ok(assignment("caching")),
        ]));
        let resolver = TaskResolver::new(endpoint, store.clone());
        let participant = ParticipantId::new("M123");

        assert!(resolver.fetch_tasks(&participant).await.unwrap().is_updated());
        let first_cache = store.load("session").await.unwrap();

        // Second fetch of the same payload: no update signal, cache unchanged
        let outcome = resolver.fetch_tasks(&participant).await.unwrap();
        assert!(!outcome.is_updated());
        assert_eq!(store.load("session").await.unwrap(), first_cache);
    }

    #[tokio::test]
    async fn changed_payload_reports_updated_again() {
        let store = Arc::new(InMemorySessionStore::new());
        let endpoint = Arc::new(FakeTasks::with(vec![
            Ok(assignment("caching")),
            Ok(assignment("caching, revised")),
        ]));
        let resolver = TaskResolver::new(endpoint, store.clone());
        let participant = ParticipantId::new("M123");

        resolver.fetch_tasks(&participant).await.unwrap();
        let outcome = resolver.fetch_tasks(&participant).await.unwrap();
        assert!(outcome.is_updated());
        assert_eq!(
            outcome.assignment().task("T1").unwrap().description,
            "caching, revised"
        );
    }

    #[tokio::test]
    async fn different_participant_with_same_payload_is_an_update() {
        let store = Arc::new(InMemorySessionStore::new());
        let endpoint = Arc::new(FakeTasks::with(vec![
            Ok(assignment("caching")),
            Ok(assignment("caching")),
        ]));
        let resolver = TaskResolver::new(endpoint, store.clone());

        resolver
            .fetch_tasks(&ParticipantId::new("M123"))
            .await
            .unwrap();
        let outcome = resolver
            .fetch_tasks(&ParticipantId::new("M456"))
            .await
            .unwrap();
        assert!(outcome.is_updated());
        let cached = store.load_session().await.unwrap().unwrap();
        assert_eq!(cached.participant, ParticipantId::new("M456"));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_prior_cache_active() {
        let store = Arc::new(InMemorySessionStore::new());
        let endpoint = Arc::new(FakeTasks::with(vec![
            Ok(assignment("caching")),
            Err(EndpointError::Http { status: 502 }),
        ]));
        let resolver = TaskResolver::new(endpoint, store.clone());
        let participant = ParticipantId::new("M123");

        resolver.fetch_tasks(&participant).await.unwrap();
        let err = resolver.fetch_tasks(&participant).await.unwrap_err();
        assert!(matches!(
            err,
            TaskFetchError::Endpoint(EndpointError::Http { status: 502 })
        ));

        // Cache still holds the earlier assignment
        let cached = store.load_session().await.unwrap().unwrap();
        assert_eq!(cached.tasks, assignment("caching"));
    }
}
