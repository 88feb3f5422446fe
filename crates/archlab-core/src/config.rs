//! Fixed retrieval configuration and backend connection settings.
//!
//! The retrieval backend is pinned to one trained model version and one
//! corpus scope for the whole experiment so that every participant searches
//! the same index. Those identifiers live here as constants.
//!
//! [`ConnectionSettings`] carries the base URLs of the collaborating
//! services. Settings are persisted through the session store and repaired
//! field-by-field on load: a missing or mistyped field falls back to its
//! default without discarding the rest of the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Retrieval Configuration
// =============================================================================

/// Identifier of the retrieval model the search backend must use.
pub const MODEL_ID: &str = "BERT";

/// Version of the retrieval model, paired with [`MODEL_ID`].
pub const VERSION_ID: &str = "v1";

/// Corpus scope: repository URL mapped to the project keys searched within it.
///
/// Every search request carries this scope verbatim. The experiment runs
/// against a single fixed corpus.
pub const REPOS_AND_PROJECTS: (&str, &[&str]) = ("Apache", &["CASSANDRA", "HADOOP", "TAJO"]);

/// Result-count cap sent with every search request.
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// [`REPOS_AND_PROJECTS`] in the map shape the search endpoint expects.
pub fn corpus_scope() -> std::collections::BTreeMap<String, Vec<String>> {
    let (repo, projects) = REPOS_AND_PROJECTS;
    std::collections::BTreeMap::from([(
        repo.to_string(),
        projects.iter().map(|p| p.to_string()).collect(),
    )])
}

// =============================================================================
// Connection Settings
// =============================================================================

const DEFAULT_DATABASE_URL: &str = "https://maestro.localhost:4269/issues-db-api";
const DEFAULT_DL_MANAGER_URL: &str = "https://maestro.localhost:4269/dl-manager";
const DEFAULT_SEARCH_ENGINE_URL: &str = "https://maestro.localhost:4269/search-engine";
const DEFAULT_ARCH_RAG_URL: &str = "https://maestro.localhost:4269/archrag";

/// Base URLs of the collaborating backend services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Issue database API: task assignments, rating submission, audit log.
    pub database_url: String,
    /// Deep-learning manager (model lifecycle; not called by this core).
    pub dl_manager_url: String,
    /// Search engine: retrieval requests.
    pub search_engine_url: String,
    /// Retrieval-augmented generation service: query rewriting.
    pub arch_rag_url: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            dl_manager_url: DEFAULT_DL_MANAGER_URL.to_string(),
            search_engine_url: DEFAULT_SEARCH_ENGINE_URL.to_string(),
            arch_rag_url: DEFAULT_ARCH_RAG_URL.to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Rebuilds settings from a stored JSON payload, repairing bad fields.
    ///
    /// Each URL field that is missing or not a string is replaced with its
    /// default; the remaining fields are kept. A payload that is not an
    /// object at all yields the full defaults. Returns the settings and
    /// whether any repair happened (callers persist the value back when it
    /// did).
    pub fn from_stored(value: &Value) -> (Self, bool) {
        let Some(object) = value.as_object() else {
            return (Self::default(), true);
        };

        let defaults = Self::default();
        let mut repaired = false;
        let mut field = |name: &str, default: &str| -> String {
            match object.get(name).and_then(Value::as_str) {
                Some(url) => url.to_string(),
                None => {
                    repaired = true;
                    default.to_string()
                }
            }
        };

        let settings = Self {
            database_url: field("database_url", &defaults.database_url),
            dl_manager_url: field("dl_manager_url", &defaults.dl_manager_url),
            search_engine_url: field("search_engine_url", &defaults.search_engine_url),
            arch_rag_url: field("arch_rag_url", &defaults.arch_rag_url),
        };
        (settings, repaired)
    }

    /// Checks that every configured URL parses.
    pub fn validate(&self) -> Result<(), url::ParseError> {
        for candidate in [
            &self.database_url,
            &self.dl_manager_url,
            &self.search_engine_url,
            &self.arch_rag_url,
        ] {
            url::Url::parse(candidate)?;
        }
        Ok(())
    }
}
