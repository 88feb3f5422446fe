//! Experiment audit trail.
//!
//! Every state transition that matters for post-hoc analysis (rewrite
//! attempted, retrieval succeeded/failed/empty, submission started/finished)
//! is recorded as a structured [`AuditEvent`] carrying the participant,
//! task, and question it happened under. The trail is part of the protocol
//! contract, not incidental logging, so the sink is an injected capability:
//! production wires the log endpoint, tests capture events in memory, and
//! the pipeline's decision logic stays network-free.
//!
//! Emission is fire-and-forget; callers never await or observe delivery.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Warning => "warning",
            AuditLevel::Error => "error",
        }
    }
}

/// One entry of the experiment audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub level: AuditLevel,
    pub participant: String,
    pub task: String,
    pub question: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit events.
///
/// `emit` must not block and must not surface failures to the caller; a lost
/// audit event never aborts the participant's flow.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Sink that discards every event.
#[derive(Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

/// Sink that records events in memory, for asserting on the trail in tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far, in order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit sink lock poisoned").clone()
    }

    /// Messages only, for compact assertions.
    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.message).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().expect("audit sink lock poisoned").push(event);
    }
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn emit(&self, event: AuditEvent) {
        (**self).emit(event)
    }
}

/// An audit sink bound to one participant/task/question context.
///
/// The pipeline and the submission guard emit several events per operation;
/// the scope keeps them from re-threading the same three identifiers through
/// every call site.
#[derive(Clone)]
pub struct AuditScope {
    sink: Arc<dyn AuditSink>,
    participant: String,
    task: String,
    question: String,
}

impl AuditScope {
    pub fn new(
        sink: Arc<dyn AuditSink>,
        participant: impl Into<String>,
        task: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            participant: participant.into(),
            task: task.into(),
            question: question.into(),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(AuditLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(AuditLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(AuditLevel::Error, message.into());
    }

    fn emit(&self, level: AuditLevel, message: String) {
        self.sink.emit(AuditEvent {
            level,
            participant: self.participant.clone(),
            task: self.task.clone(),
            question: self.question.clone(),
            message,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_stamps_context_on_every_event() {
        let sink = Arc::new(MemoryAuditSink::new());
        let scope = AuditScope::new(sink.clone(), "M123", "T1", "Q1");

        scope.info("search requested");
        scope.error("search failed");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.participant == "M123"));
        assert!(events.iter().all(|e| e.task == "T1" && e.question == "Q1"));
        assert_eq!(events[0].level, AuditLevel::Info);
        assert_eq!(events[1].level, AuditLevel::Error);
    }
}
