//! High-level experiment session.
//!
//! [`ExperimentSession`] wires the task resolver, query pipeline, rating
//! tracker, and submission guard over one shared session store and one set
//! of endpoint handles. It owns all mutable session state; the scheduling
//! model is cooperative and single-owner (`&mut self` per operation), so the
//! participant-scoped cache has exactly one writer. Drivers that want to
//! race operations from several tasks must put the session behind a mutex.
//!
//! The lifecycle mirrors the participant's flow: restore or fetch the task
//! assignment, select a task, open a question, search and rate (possibly
//! repeatedly), submit. Opening a question or searching again always starts
//! from a clean rating slate.

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::config::ConnectionSettings;
use crate::endpoints::{
    HttpAuditSink, HttpExperimentClient, RewriteEndpoint, SearchEndpoint, SubmissionEndpoint,
    TaskEndpoint,
};
use crate::error::{SearchError, SessionError};
use crate::model::{ParticipantId, Question, QuestionKey, Task, TaskAssignment};
use crate::rating::RatingTracker;
use crate::search::{QueryPipeline, SearchOutcome};
use crate::store::{SessionStore, SessionStoreExt};
use crate::submit::SubmissionGuard;
use crate::tasks::{FetchOutcome, TaskResolver};

/// State of the question currently open in the search view.
struct ActiveQuestion {
    task: String,
    question: QuestionKey,
    tracker: RatingTracker,
    /// Query actually dispatched by the last successful search; recorded on
    /// submission.
    last_query: Option<String>,
}

/// One participant's experiment session.
pub struct ExperimentSession {
    store: Arc<dyn SessionStore>,
    resolver: TaskResolver,
    pipeline: QueryPipeline,
    guard: SubmissionGuard,
    participant: Option<ParticipantId>,
    assignment: Option<TaskAssignment>,
    selected_task: Option<String>,
    active: Option<ActiveQuestion>,
}

impl ExperimentSession {
    /// Builds a session from individually injected collaborators.
    pub fn new(
        store: Arc<dyn SessionStore>,
        tasks: Arc<dyn TaskEndpoint>,
        rewrite: Arc<dyn RewriteEndpoint>,
        search: Arc<dyn SearchEndpoint>,
        submission: Arc<dyn SubmissionEndpoint>,
        audit: Arc<dyn AuditSink>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            resolver: TaskResolver::new(tasks, store.clone()),
            pipeline: QueryPipeline::new(rewrite, search, audit.clone(), settings),
            guard: SubmissionGuard::new(submission, audit),
            store,
            participant: None,
            assignment: None,
            selected_task: None,
            active: None,
        }
    }

    /// Builds a session over the HTTP backends configured in `settings`.
    pub fn with_http(store: Arc<dyn SessionStore>, settings: ConnectionSettings) -> Self {
        let client = Arc::new(HttpExperimentClient::new(settings.clone()));
        let audit = Arc::new(HttpAuditSink::new(&settings));
        Self::new(
            store,
            client.clone(),
            client.clone(),
            client.clone(),
            client,
            audit,
            settings,
        )
    }

    /// Restores participant, assignment, and selected task from the cache.
    ///
    /// Returns whether a cached session existed.
    pub async fn restore(&mut self) -> Result<bool, SessionError> {
        let Some(session) = self.store.load_session().await? else {
            return Ok(false);
        };
        self.participant = Some(session.participant);
        self.assignment = Some(session.tasks);
        self.selected_task = self.store.load_selected_task().await?;
        Ok(true)
    }

    pub fn participant(&self) -> Option<&ParticipantId> {
        self.participant.as_ref()
    }

    pub fn assignment(&self) -> Option<&TaskAssignment> {
        self.assignment.as_ref()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let name = self.selected_task.as_deref()?;
        self.assignment.as_ref()?.task(name)
    }

    /// Task and question key of the currently open question.
    pub fn active_question(&self) -> Option<(&str, &str)> {
        self.active
            .as_ref()
            .map(|active| (active.task.as_str(), active.question.as_str()))
    }

    /// Result set and ratings of the currently open question.
    pub fn tracker(&self) -> Option<&RatingTracker> {
        self.active.as_ref().map(|active| &active.tracker)
    }

    /// Fetches (or refetches) the assignment for a participant.
    ///
    /// The session switches to `mtr_no` on success; on failure the prior
    /// participant and assignment stay active.
    pub async fn fetch_tasks(
        &mut self,
        mtr_no: &ParticipantId,
    ) -> Result<FetchOutcome, SessionError> {
        let outcome = self.resolver.fetch_tasks(mtr_no).await?;
        self.participant = Some(mtr_no.clone());
        self.assignment = Some(outcome.assignment().clone());
        Ok(outcome)
    }

    /// Selects a task by name and persists the choice for deep-linking.
    pub async fn select_task(&mut self, name: &str) -> Result<&Task, SessionError> {
        let assignment = self.assignment.as_ref().ok_or(SessionError::NoAssignment)?;
        if assignment.task(name).is_none() {
            return Err(SessionError::UnknownTask(name.to_string()));
        }
        self.store.save_selected_task(name).await?;
        self.selected_task = Some(name.to_string());
        // Borrow anew so the returned reference ties to self
        self.assignment
            .as_ref()
            .and_then(|a| a.task(name))
            .ok_or_else(|| SessionError::UnknownTask(name.to_string()))
    }

    /// Opens a question for searching and rating.
    ///
    /// Entering a question always starts with an empty result set and no
    /// ratings, as does re-entering one that was left earlier.
    pub fn open_question(
        &mut self,
        task_name: &str,
        question_key: &str,
    ) -> Result<(), SessionError> {
        let assignment = self.assignment.as_ref().ok_or(SessionError::NoAssignment)?;
        let task = assignment
            .task(task_name)
            .ok_or_else(|| SessionError::UnknownTask(task_name.to_string()))?;
        if task.question(question_key).is_none() {
            return Err(SessionError::UnknownQuestion {
                task: task_name.to_string(),
                question: question_key.to_string(),
            });
        }
        self.active = Some(ActiveQuestion {
            task: task_name.to_string(),
            question: question_key.to_string(),
            tracker: RatingTracker::new(),
            last_query: None,
        });
        Ok(())
    }

    /// Leaves the question view, discarding its result set and ratings.
    pub fn close_question(&mut self) {
        self.active = None;
    }

    /// Runs a search for the open question and installs the outcome.
    ///
    /// A validation failure (empty query) leaves the current result set in
    /// place; an upstream failure clears it so the participant is never
    /// shown stale results after a failed re-search. Either way the outcome
    /// is applied only if no newer search was issued meanwhile.
    pub async fn search(&mut self, raw_query: &str) -> Result<SearchOutcome, SessionError> {
        let (task_name, question_key, generation) = {
            let active = self.active.as_mut().ok_or(SessionError::NoActiveQuestion)?;
            (
                active.task.clone(),
                active.question.clone(),
                active.tracker.begin_search(),
            )
        };
        let participant = self
            .participant
            .clone()
            .ok_or(SessionError::NoParticipant)?;
        let (task, question) = self.lookup(&task_name, &question_key)?;

        let result = self
            .pipeline
            .execute(&participant, &task, &question_key, &question, raw_query)
            .await;

        let active = self.active.as_mut().ok_or(SessionError::NoActiveQuestion)?;
        match result {
            Ok(outcome) => {
                if !active.tracker.install(generation, outcome.results.clone()) {
                    return Err(SearchError::Superseded.into());
                }
                active.last_query = Some(outcome.effective_query.clone());
                Ok(outcome)
            }
            Err(SearchError::EmptyQuery) => Err(SearchError::EmptyQuery.into()),
            Err(e) => {
                // Failed search: clear the stale result set (unless an even
                // newer search already took over).
                active.tracker.clear(generation);
                Err(e.into())
            }
        }
    }

    /// Records a rating for the result displayed at `position`.
    pub fn rate(
        &mut self,
        position: usize,
        issue_id: i64,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveQuestion)?;
        active.tracker.rate(position, issue_id, value)?;
        Ok(())
    }

    /// Submits the open question's completed ratings.
    ///
    /// On success the question view is closed (the participant navigates
    /// back to the task list); the question may be reopened and re-submitted
    /// later. On failure all state stays for a manual retry.
    pub async fn submit(&mut self) -> Result<(), SessionError> {
        let participant = self
            .participant
            .clone()
            .ok_or(SessionError::NoParticipant)?;
        let active = self.active.as_ref().ok_or(SessionError::NoActiveQuestion)?;

        let query = active.last_query.clone().unwrap_or_default();
        self.guard
            .submit(
                &participant,
                &active.task,
                &active.question,
                &query,
                &active.tracker,
            )
            .await?;

        self.close_question();
        Ok(())
    }

    /// Clears the cached session for an explicit participant switch.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        self.store.clear().await.map_err(SessionError::Store)?;
        self.participant = None;
        self.assignment = None;
        self.selected_task = None;
        self.active = None;
        Ok(())
    }

    fn lookup(
        &self,
        task_name: &str,
        question_key: &str,
    ) -> Result<(Task, Question), SessionError> {
        let assignment = self.assignment.as_ref().ok_or(SessionError::NoAssignment)?;
        let task = assignment
            .task(task_name)
            .ok_or_else(|| SessionError::UnknownTask(task_name.to_string()))?;
        let question = task.question(question_key).ok_or_else(|| {
            SessionError::UnknownQuestion {
                task: task_name.to_string(),
                question: question_key.to_string(),
            }
        })?;
        Ok((task.clone(), question.clone()))
    }
}
