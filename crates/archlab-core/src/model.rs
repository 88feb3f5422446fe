//! Data model for participants, tasks, and questions.
//!
//! The task assignment arrives from the task endpoint as a JSON array and is
//! cached verbatim between sessions, so every type here derives both serde
//! traits and `PartialEq` (the resolver detects changed assignments by
//! structural comparison).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of recorded solutions at which a question counts as solved.
pub const SOLVED_THRESHOLD: usize = 2;

/// Matriculation-style identifier of the human participant.
///
/// The sole cross-session identity key: once set, every task, question, and
/// rating operation is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a question within its task.
pub type QuestionKey = String;

/// Likert scale definition: integer score to human-readable label.
///
/// Tasks may carry their own scale; when the server sends none, the
/// five-point relevance scale from the experiment instructions applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingScale(BTreeMap<u8, String>);

impl Default for RatingScale {
    fn default() -> Self {
        Self(BTreeMap::from([
            (1, "Not relevant".to_string()),
            (2, "Less relevant".to_string()),
            (3, "Distantly relevant".to_string()),
            (4, "Relevant".to_string()),
            (5, "Very relevant".to_string()),
        ]))
    }
}

impl RatingScale {
    /// Label for a score, if the score is part of the scale.
    pub fn label(&self, score: u8) -> Option<&str> {
        self.0.get(&score).map(String::as_str)
    }

    pub fn contains(&self, score: u8) -> bool {
        self.0.contains_key(&score)
    }

    /// Scores in ascending order with their labels.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &str)> {
        self.0.iter().map(|(score, label)| (*score, label.as_str()))
    }
}

/// Nullable-boolean-as-string design decision prediction triple.
///
/// Only consulted when the owning task enables reranked retrieval; each
/// component is `"true"`, `"false"`, or absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignDecisionPrediction {
    #[serde(default)]
    pub existence: Option<String>,
    #[serde(default)]
    pub executive: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
}

/// A single information need within a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub description: String,
    /// Question-type tag shown to the participant (e.g. "Existence").
    #[serde(rename = "type", default)]
    pub question_type: String,
    /// Reranking hints for this question, when known.
    #[serde(default)]
    pub design_decision: Option<DesignDecisionPrediction>,
}

/// A named unit of the experiment containing one or more questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "taskName")]
    pub name: String,
    pub description: String,
    /// Supplementary free-text detail shown alongside the description.
    #[serde(default)]
    pub task_details: String,
    pub questions: BTreeMap<QuestionKey, Question>,
    /// Whether queries are rewritten by the language model before retrieval.
    #[serde(default)]
    pub gpt: bool,
    /// Whether retrieval uses the reranking engine with prediction signals.
    #[serde(default)]
    pub rerank_engine: bool,
    #[serde(default)]
    pub scale: RatingScale,
    /// Recorded solution attempts per question, maintained server-side.
    #[serde(default)]
    pub solutions: BTreeMap<QuestionKey, Vec<String>>,
}

impl Task {
    pub fn question(&self, key: &str) -> Option<&Question> {
        self.questions.get(key)
    }

    /// Number of solutions recorded for a question.
    pub fn solved_count(&self, key: &str) -> usize {
        self.solutions.get(key).map_or(0, Vec::len)
    }

    /// A question is solved once it has [`SOLVED_THRESHOLD`] recorded solutions.
    pub fn is_solved(&self, key: &str) -> bool {
        self.solved_count(key) >= SOLVED_THRESHOLD
    }
}

/// Ordered sequence of tasks assigned to one participant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskAssignment(Vec<Task>);

impl TaskAssignment {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self(tasks)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.0
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.0.iter().find(|task| task.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Participant identity plus assignment, as cached between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub participant: ParticipantId,
    pub tasks: TaskAssignment,
}
