use std::path::PathBuf;

use super::api_key_repository::{ApiKeyRecord, ApiKeyRepository, BoxFuture};
use super::error::RepositoryResult;
use super::json_file;

/// Stores the API key in `~/.config/chatline/api_key.json`
pub struct ApiKeyJsonRepository {
    file_path: PathBuf,
}

impl ApiKeyJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> RepositoryResult<Self> {
        Ok(Self {
            file_path: json_file::config_file("api_key.json")?,
        })
    }

    /// Create repository with custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl ApiKeyRepository for ApiKeyJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let record: Option<ApiKeyRecord> = json_file::read_json(&path).await?;
            Ok(record.map(|r| r.api_key))
        })
    }

    fn save(&self, api_key: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move { json_file::write_json(&path, &ApiKeyRecord { api_key }).await })
    }

    fn clear(&self) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move { json_file::remove_file(&path).await })
    }
}
