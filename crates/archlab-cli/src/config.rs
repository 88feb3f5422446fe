//! Data directory resolution and session construction for the CLI.
//!
//! The session cache lives in the platform's standard application data
//! location unless overridden with `--data-dir`. Connection settings are
//! loaded (and repaired if damaged) from the same cache before the HTTP
//! backends are wired up.

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;

use archlab_core::session::ExperimentSession;
use archlab_core::store::{load_or_init_settings, FileSessionStore, SessionStore};

/// Returns the session data directory.
///
/// - macOS: `~/Library/Application Support/org.archlab.Archlab/`
/// - Linux: `~/.local/share/archlab/`
/// - Windows: `%APPDATA%\archlab\Archlab\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("org", "archlab", "Archlab")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Opens the session cache and builds an HTTP-backed experiment session.
pub async fn open_session(custom_dir: Option<&PathBuf>) -> Result<ExperimentSession> {
    let data_dir = get_data_dir(custom_dir)?;
    let store = FileSessionStore::open(&data_dir)
        .with_context(|| format!("Failed to open session cache: {}", data_dir.display()))?;
    let store: Arc<dyn SessionStore> = Arc::new(store);

    let settings = load_or_init_settings(&store)
        .await
        .context("Failed to load connection settings")?;
    settings
        .validate()
        .context("Connection settings contain an invalid URL")?;

    Ok(ExperimentSession::with_http(store, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_data_dir_wins() {
        let custom = PathBuf::from("/tmp/archlab-data");
        assert_eq!(get_data_dir(Some(&custom)).unwrap(), custom);
    }

    #[test]
    fn default_data_dir_uses_project_identifier() {
        let dir = get_data_dir(None).unwrap();
        let dir_str = dir.to_string_lossy().to_lowercase();
        assert!(
            dir_str.contains("archlab"),
            "Data dir should use the project identifier: {}",
            dir_str
        );
    }

    #[tokio::test]
    async fn open_session_seeds_settings() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().to_path_buf();
        open_session(Some(&custom)).await.unwrap();
        assert!(custom.join("connection_settings.json").exists());
    }
}
