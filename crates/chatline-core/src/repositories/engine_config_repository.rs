use std::path::PathBuf;

use super::api_key_repository::BoxFuture;
use super::error::RepositoryResult;
use super::json_file;
use crate::settings::EngineConfig;

pub trait EngineConfigRepository: Send + Sync + 'static {
    /// Load the engine configuration, defaults when nothing is stored
    fn load(&self) -> BoxFuture<'static, RepositoryResult<EngineConfig>>;

    /// Save the engine configuration
    fn save(&self, config: EngineConfig) -> BoxFuture<'static, RepositoryResult<()>>;
}

/// Stores the engine configuration in `~/.config/chatline/config.json`
pub struct EngineConfigJsonRepository {
    file_path: PathBuf,
}

impl EngineConfigJsonRepository {
    /// Create repository with XDG-compliant path
    pub fn new() -> RepositoryResult<Self> {
        Ok(Self {
            file_path: json_file::config_file("config.json")?,
        })
    }

    /// Create repository with custom path (for testing)
    pub fn with_path(file_path: PathBuf) -> Self {
        Self { file_path }
    }
}

impl EngineConfigRepository for EngineConfigJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<EngineConfig>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let config: Option<EngineConfig> = json_file::read_json(&path).await?;
            // First run: nothing stored yet
            Ok(config.unwrap_or_default())
        })
    }

    fn save(&self, config: EngineConfig) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move { json_file::write_json(&path, &config).await })
    }
}
