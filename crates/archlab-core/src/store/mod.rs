//! Session cache for participant-scoped state.
//!
//! The experiment keeps a small amount of state across page reloads: the
//! participant identifier with their task assignment, the last selected task
//! (for deep-linking back into a question view), and the backend connection
//! settings. [`SessionStore`] abstracts over where that cache lives:
//!
//! - [`InMemorySessionStore`] - no persistence, for tests
//! - [`FileSessionStore`] - one JSON file per entry under a data directory,
//!   survives process restart
//!
//! No payload-shape validation happens here; the store moves raw JSON. The
//! task resolver validates assignments and [`load_or_init_settings`] repairs
//! connection settings on the way in.

mod file_store;

pub use file_store::FileSessionStore;

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use thiserror::Error;

use crate::config::ConnectionSettings;
use crate::model::StoredSession;

/// Cache entry key for the participant + assignment record.
pub const KEY_SESSION: &str = "session";
/// Cache entry key for the last selected task name.
pub const KEY_SELECTED_TASK: &str = "selected_task";
/// Cache entry key for the backend connection settings.
pub const KEY_SETTINGS: &str = "connection_settings";

/// Session store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Durable key/value cache for cross-session experiment state.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Raw JSON value stored under `key`, or `None` when absent.
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Removes every cache entry (explicit participant-switch action).
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Typed accessors over the raw key/value contract.
///
/// Kept as an extension trait so store implementations only deal in JSON
/// values while callers work with model types.
#[async_trait::async_trait]
pub trait SessionStoreExt: SessionStore {
    async fn load_session(&self) -> Result<Option<StoredSession>, StoreError> {
        load_typed(self, KEY_SESSION).await
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), StoreError> {
        save_typed(self, KEY_SESSION, session).await
    }

    async fn load_selected_task(&self) -> Result<Option<String>, StoreError> {
        load_typed(self, KEY_SELECTED_TASK).await
    }

    async fn save_selected_task(&self, task_name: &str) -> Result<(), StoreError> {
        save_typed(self, KEY_SELECTED_TASK, &task_name).await
    }
}

#[async_trait::async_trait]
impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

async fn load_typed<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: SessionStore + ?Sized,
    T: serde::de::DeserializeOwned,
{
    match store.load(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

async fn save_typed<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: SessionStore + ?Sized,
    T: serde::Serialize,
{
    let value = serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.save(key, &value).await
}

/// Loads connection settings, repairing or seeding the cached entry.
///
/// Mirrors the settings lifecycle of the original client: absent entry is
/// seeded with defaults, a partially damaged entry has only the damaged
/// fields reset, and the repaired value is persisted back so later loads see
/// a clean payload.
pub async fn load_or_init_settings<S>(store: &S) -> Result<ConnectionSettings, StoreError>
where
    S: SessionStore + ?Sized,
{
    let (settings, dirty) = match store.load(KEY_SETTINGS).await? {
        Some(value) => ConnectionSettings::from_stored(&value),
        None => (ConnectionSettings::default(), true),
    };
    if dirty {
        save_typed(store, KEY_SETTINGS, &settings).await?;
    }
    Ok(settings)
}

/// In-memory session store that does not persist across restarts.
///
/// Useful for tests and for running without a writable data directory.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Io(format!("Lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Io(format!("Lock poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Io(format!("Lock poisoned: {}", e)))?;
        entries.clear();
        Ok(())
    }
}

// Blanket implementation so a shared store can be passed around by Arc.
#[async_trait::async_trait]
impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).save(key, value).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParticipantId, TaskAssignment};
    use serde_json::json;

    #[tokio::test]
    async fn session_roundtrip() {
        let store = InMemorySessionStore::new();
        assert!(store.load_session().await.unwrap().is_none());

        let session = StoredSession {
            participant: ParticipantId::new("M123"),
            tasks: TaskAssignment::default(),
        };
        store.save_session(&session).await.unwrap();
        assert_eq!(store.load_session().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert!(store.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn selected_task_roundtrip() {
        let store = InMemorySessionStore::new();
        store.save_selected_task("T1").await.unwrap();
        assert_eq!(
            store.load_selected_task().await.unwrap().as_deref(),
            Some("T1")
        );
    }

    #[tokio::test]
    async fn settings_are_seeded_on_first_load() {
        let store = InMemorySessionStore::new();
        let settings = load_or_init_settings(&store).await.unwrap();
        assert_eq!(settings, ConnectionSettings::default());
        // Seed was persisted
        assert!(store.load(KEY_SETTINGS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn settings_repair_is_persisted_back() {
        let store = InMemorySessionStore::new();
        store
            .save(
                KEY_SETTINGS,
                &json!({ "database_url": "https://example.org/db" }),
            )
            .await
            .unwrap();

        let settings = load_or_init_settings(&store).await.unwrap();
        assert_eq!(settings.database_url, "https://example.org/db");

        let stored = store.load(KEY_SETTINGS).await.unwrap().unwrap();
        let (reloaded, dirty) = ConnectionSettings::from_stored(&stored);
        assert_eq!(reloaded, settings);
        assert!(!dirty);
    }
}
