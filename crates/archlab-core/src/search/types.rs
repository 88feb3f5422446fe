//! Search result payloads and pipeline outcomes.

use serde::{Deserialize, Serialize};

/// One issue returned by the search backend.
///
/// Order within a response is the display and rating order and is preserved
/// end to end: ratings are positional, not keyed by issue identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Server-assigned identifier, unique within one search response.
    pub id: i64,
    /// Human-readable issue key (e.g. `CASSANDRA-1234`).
    pub key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    /// Design decision classification labels, when the backend provides them.
    #[serde(default)]
    pub existence: Option<String>,
    #[serde(default)]
    pub executive: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    /// Relevance score as ranked by the backend.
    #[serde(default)]
    pub score: f64,
}

/// Result of one successful pipeline run.
///
/// An empty `results` list is the explicit "no results" state, not an error.
/// `effective_query` is the query that was actually dispatched, which is the
/// rewritten one when the task has rewriting enabled; it is the query string
/// recorded at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub effective_query: String,
    pub results: Vec<SearchResult>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_minimal_backend_payload() {
        // Backends omit most optional fields for issues without labels.
        let result: SearchResult = serde_json::from_value(json!({
            "id": 42,
            "key": "HADOOP-7",
            "summary": "Node manager leaks file descriptors",
            "score": 0.87
        }))
        .unwrap();
        assert_eq!(result.id, 42);
        assert!(result.comments.is_empty());
        assert!(result.existence.is_none());
    }

    #[test]
    fn preserves_payload_order() {
        let results: Vec<SearchResult> = serde_json::from_value(json!([
            { "id": 3, "key": "A-3" },
            { "id": 1, "key": "A-1" },
            { "id": 2, "key": "A-2" }
        ]))
        .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
