//! End-to-end tests for the experiment session flow.
//!
//! These exercise the full participant path over fake backends: fetch the
//! task assignment, open a question, search, rate every result, submit.
//! The fakes record every request so the tests can assert on exactly what
//! would have reached the real services.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use archlab_core::audit::MemoryAuditSink;
use archlab_core::config::ConnectionSettings;
use archlab_core::endpoints::{
    EndpointError, RewriteEndpoint, RewriteRequest, RewriteResponse, SearchEndpoint,
    SearchRequest, SearchResponse, SubmissionEndpoint, SubmissionRequest, SubmissionResponse,
    TaskEndpoint, TasksRequest,
};
use archlab_core::error::{SearchError, SessionError, SubmitError};
use archlab_core::model::{ParticipantId, Question, Task, TaskAssignment};
use archlab_core::search::SearchResult;
use archlab_core::session::ExperimentSession;
use archlab_core::store::{FileSessionStore, InMemorySessionStore, SessionStore};

// ============================================================================
// Fake backend
// ============================================================================

#[derive(Default)]
struct FakeBackend {
    tasks: Mutex<TaskAssignment>,
    rewrite_answer: Mutex<Option<String>>,
    search_payload: Mutex<Vec<SearchResult>>,
    fail_search: AtomicBool,
    submit_success: AtomicBool,
    search_requests: Mutex<Vec<SearchRequest>>,
    rewrite_requests: Mutex<Vec<RewriteRequest>>,
    submissions: Mutex<Vec<SubmissionRequest>>,
}

impl FakeBackend {
    fn new(tasks: TaskAssignment) -> Arc<Self> {
        let backend = Self::default();
        *backend.tasks.lock().unwrap() = tasks;
        backend.submit_success.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    fn set_results(&self, results: Vec<SearchResult>) {
        *self.search_payload.lock().unwrap() = results;
    }

    fn search_count(&self) -> usize {
        self.search_requests.lock().unwrap().len()
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TaskEndpoint for FakeBackend {
    async fn fetch_tasks(&self, _request: &TasksRequest) -> Result<TaskAssignment, EndpointError> {
        Ok(self.tasks.lock().unwrap().clone())
    }
}

#[async_trait::async_trait]
impl RewriteEndpoint for FakeBackend {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<RewriteResponse, EndpointError> {
        self.rewrite_requests.lock().unwrap().push(request.clone());
        Ok(RewriteResponse {
            answer: self.rewrite_answer.lock().unwrap().clone(),
        })
    }
}

#[async_trait::async_trait]
impl SearchEndpoint for FakeBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, EndpointError> {
        self.search_requests.lock().unwrap().push(request.clone());
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(EndpointError::Http { status: 500 });
        }
        Ok(SearchResponse {
            result: "done".into(),
            payload: self.search_payload.lock().unwrap().clone(),
        })
    }
}

#[async_trait::async_trait]
impl SubmissionEndpoint for FakeBackend {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse, EndpointError> {
        self.submissions.lock().unwrap().push(request.clone());
        Ok(SubmissionResponse {
            success: self.submit_success.load(Ordering::SeqCst),
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn question(description: &str) -> Question {
    Question {
        description: description.into(),
        question_type: "Existence".into(),
        design_decision: None,
    }
}

fn single_task_assignment(gpt: bool) -> TaskAssignment {
    TaskAssignment::new(vec![Task {
        name: "T1".into(),
        description: "Investigate memory issues".into(),
        task_details: String::new(),
        questions: [("Q1".to_string(), question("Where do leaks come from?"))].into(),
        gpt,
        rerank_engine: false,
        scale: Default::default(),
        solutions: Default::default(),
    }])
}

fn issue(id: i64, key: &str) -> SearchResult {
    SearchResult {
        id,
        key: key.to_string(),
        summary: format!("{} summary", key),
        description: String::new(),
        attachments: Vec::new(),
        comments: Vec::new(),
        existence: None,
        executive: None,
        property: None,
        score: 1.0,
    }
}

fn session_over(
    backend: Arc<FakeBackend>,
    store: Arc<dyn SessionStore>,
    audit: Arc<MemoryAuditSink>,
) -> ExperimentSession {
    ExperimentSession::new(
        store,
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend,
        audit,
        ConnectionSettings::default(),
    )
}

async fn opened_session(backend: Arc<FakeBackend>) -> ExperimentSession {
    let mut session = session_over(
        backend,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(MemoryAuditSink::new()),
    );
    session
        .fetch_tasks(&ParticipantId::new("M123"))
        .await
        .unwrap();
    session.select_task("T1").await.unwrap();
    session.open_question("T1", "Q1").unwrap();
    session
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn full_rating_flow_submits_positional_payload() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1"), issue(102, "CASSANDRA-2")]);
    let mut session = opened_session(backend.clone()).await;

    let outcome = session.search("memory leak").await.unwrap();
    assert_eq!(outcome.len(), 2);

    session.rate(0, 101, "4").unwrap();
    session.rate(1, 102, "5").unwrap();
    session.submit().await.unwrap();

    let submissions = backend.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let posted = &submissions[0];
    assert_eq!(posted.matriculation_number, "M123");
    assert_eq!(posted.task_id, "T1");
    assert_eq!(posted.question_key, "Q1");
    assert_eq!(posted.search_query, "memory leak");
    let pairs: Vec<(i64, &str)> = posted
        .ratings
        .iter()
        .map(|r| (r.issue_id, r.rating.as_str()))
        .collect();
    assert_eq!(pairs, vec![(101, "4"), (102, "5")]);

    // Successful submission navigates back out of the question view
    assert!(session.active_question().is_none());
}

#[tokio::test]
async fn partial_ratings_block_submission_locally() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1"), issue(102, "CASSANDRA-2")]);
    let mut session = opened_session(backend.clone()).await;

    session.search("memory leak").await.unwrap();
    session.rate(0, 101, "4").unwrap();

    let err = session.submit().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Submit(SubmitError::RatingsIncomplete)
    ));
    assert_eq!(backend.submission_count(), 0);
    // The question stays open with its ratings intact
    assert_eq!(session.tracker().unwrap().rating_count(), 1);
}

#[tokio::test]
async fn failed_rewrite_sends_no_search_request() {
    let backend = FakeBackend::new(single_task_assignment(true));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    // rewrite_answer stays None: the rewrite returns no usable answer
    let mut session = opened_session(backend.clone()).await;

    let err = session.search("memory leak").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Search(SearchError::RewriteFailed { .. })
    ));
    assert_eq!(backend.search_count(), 0);
    assert_eq!(backend.rewrite_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rewrite_answer_is_recorded_as_submitted_query() {
    let backend = FakeBackend::new(single_task_assignment(true));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    *backend.rewrite_answer.lock().unwrap() = Some("heap allocation leak".into());
    let mut session = opened_session(backend.clone()).await;

    let outcome = session.search("what leaks memory?").await.unwrap();
    assert_eq!(outcome.effective_query, "heap allocation leak");

    session.rate(0, 101, "3").unwrap();
    session.submit().await.unwrap();

    let submissions = backend.submissions.lock().unwrap();
    assert_eq!(submissions[0].search_query, "heap allocation leak");
}

#[tokio::test]
async fn new_search_discards_previous_ratings() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    let mut session = opened_session(backend.clone()).await;

    session.search("memory leak").await.unwrap();
    session.rate(0, 101, "4").unwrap();
    assert!(session.tracker().unwrap().is_complete());

    backend.set_results(vec![issue(201, "HADOOP-9"), issue(202, "HADOOP-10")]);
    session.search("file descriptor leak").await.unwrap();

    let tracker = session.tracker().unwrap();
    assert_eq!(tracker.result_count(), 2);
    assert_eq!(tracker.rating_count(), 0);
    assert!(!tracker.is_complete());
}

#[tokio::test]
async fn failed_search_clears_previous_results() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    let mut session = opened_session(backend.clone()).await;

    session.search("memory leak").await.unwrap();
    assert_eq!(session.tracker().unwrap().result_count(), 1);

    backend.fail_search.store(true, Ordering::SeqCst);
    let err = session.search("memory leak again").await.unwrap_err();
    assert!(matches!(err, SessionError::Search(SearchError::Endpoint(_))));

    // No stale results survive a failed re-search
    assert_eq!(session.tracker().unwrap().result_count(), 0);
}

#[tokio::test]
async fn empty_query_leaves_results_in_place() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    let mut session = opened_session(backend.clone()).await;

    session.search("memory leak").await.unwrap();
    let err = session.search("   ").await.unwrap_err();
    assert!(matches!(err, SessionError::Search(SearchError::EmptyQuery)));

    assert_eq!(session.tracker().unwrap().result_count(), 1);
    assert_eq!(backend.search_count(), 1);
}

#[tokio::test]
async fn empty_result_set_is_surfaced_not_failed() {
    let backend = FakeBackend::new(single_task_assignment(false));
    let mut session = opened_session(backend.clone()).await;

    let outcome = session.search("nothing matches this").await.unwrap();
    assert!(outcome.is_empty());
    assert!(!session.tracker().unwrap().is_complete());
}

#[tokio::test]
async fn question_can_be_resubmitted_after_success() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    let mut session = opened_session(backend.clone()).await;

    session.search("memory leak").await.unwrap();
    session.rate(0, 101, "4").unwrap();
    session.submit().await.unwrap();

    // Revisit the same question and submit a fresh rating set
    session.open_question("T1", "Q1").unwrap();
    session.search("memory leak revisited").await.unwrap();
    session.rate(0, 101, "5").unwrap();
    session.submit().await.unwrap();

    assert_eq!(backend.submission_count(), 2);
}

#[tokio::test]
async fn audit_trail_covers_search_and_submission() {
    let backend = FakeBackend::new(single_task_assignment(false));
    backend.set_results(vec![issue(101, "CASSANDRA-1")]);
    let audit = Arc::new(MemoryAuditSink::new());
    let mut session = session_over(
        backend,
        Arc::new(InMemorySessionStore::new()),
        audit.clone(),
    );
    session
        .fetch_tasks(&ParticipantId::new("M123"))
        .await
        .unwrap();
    session.open_question("T1", "Q1").unwrap();

    session.search("memory leak").await.unwrap();
    session.rate(0, 101, "4").unwrap();
    session.submit().await.unwrap();

    let events = audit.events();
    assert!(events
        .iter()
        .all(|e| e.participant == "M123" && e.task == "T1" && e.question == "Q1"));
    let messages = audit.messages();
    assert!(messages.iter().any(|m| m.contains("search requested")));
    assert!(messages.iter().any(|m| m.contains("search returned 1 results")));
    assert!(messages.iter().any(|m| m.contains("submission started")));
    assert!(messages.iter().any(|m| m.contains("submission succeeded")));
}

#[tokio::test]
async fn session_restores_from_file_store_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeBackend::new(single_task_assignment(false));

    {
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::open(dir.path()).unwrap());
        let mut session = session_over(backend.clone(), store, Arc::new(MemoryAuditSink::new()));
        session
            .fetch_tasks(&ParticipantId::new("M123"))
            .await
            .unwrap();
        session.select_task("T1").await.unwrap();
    }

    // A brand new session over the same directory picks the state back up
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open(dir.path()).unwrap());
    let mut session = session_over(backend, store, Arc::new(MemoryAuditSink::new()));
    assert!(session.restore().await.unwrap());
    assert_eq!(
        session.participant().map(|p| p.as_str().to_string()),
        Some("M123".to_string())
    );
    assert_eq!(session.selected_task().unwrap().name, "T1");
}

#[tokio::test]
async fn refetching_identical_assignment_is_not_an_update() {
    let backend = FakeBackend::new(single_task_assignment(false));
    let mut session = session_over(
        backend,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(MemoryAuditSink::new()),
    );
    let participant = ParticipantId::new("M123");

    let first = session.fetch_tasks(&participant).await.unwrap();
    assert!(first.is_updated());

    // Same payload fetched again: the "fetched" acknowledgment must not fire
    let second = session.fetch_tasks(&participant).await.unwrap();
    assert!(!second.is_updated());
}
