use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{RepositoryError, RepositoryResult};

const APP_DIR: &str = "chatline";

/// XDG-compliant path for a file in the application's config directory
pub(crate) fn config_file(name: &str) -> RepositoryResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| RepositoryError::PathError("Cannot determine config directory".into()))?;

    Ok(config_dir.join(APP_DIR).join(name))
}

/// Read and parse a JSON file. Returns `Ok(None)` if the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> RepositoryResult<Option<T>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }

    let contents = tokio::fs::read_to_string(path).await?;
    let value = serde_json::from_str(&contents)?;
    Ok(Some(value))
}

/// Serialize `value` and write it atomically (temp file + rename)
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> RepositoryResult<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
    tokio::fs::write(&temp_path, json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

/// Remove a file, treating "already gone" as success
pub(crate) async fn remove_file(path: &Path) -> RepositoryResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
