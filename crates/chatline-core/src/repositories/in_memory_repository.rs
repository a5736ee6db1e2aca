use std::sync::Arc;

use parking_lot::Mutex;

use super::api_key_repository::{ApiKeyRepository, BoxFuture};
use super::error::{RepositoryError, RepositoryResult};

/// In-memory key repository.
/// Useful for testing and for sessions that must not touch the disk.
#[derive(Clone, Default)]
pub struct InMemoryApiKeyRepository {
    stored: Arc<Mutex<Option<String>>>,
    failing: Arc<Mutex<bool>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with a stored key
    pub fn with_key(api_key: &str) -> Self {
        let repo = Self::new();
        *repo.stored.lock() = Some(api_key.to_string());
        repo
    }

    /// Make every subsequent operation fail with an IO error
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Currently stored value
    pub fn stored(&self) -> Option<String> {
        self.stored.lock().clone()
    }

    fn check(failing: &Mutex<bool>) -> RepositoryResult<()> {
        if *failing.lock() {
            return Err(RepositoryError::IoError(std::io::Error::other(
                "key storage unavailable",
            )));
        }
        Ok(())
    }
}

impl ApiKeyRepository for InMemoryApiKeyRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let stored = self.stored.clone();
        let failing = self.failing.clone();

        Box::pin(async move {
            Self::check(&failing)?;
            Ok(stored.lock().clone())
        })
    }

    fn save(&self, api_key: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let stored = self.stored.clone();
        let failing = self.failing.clone();

        Box::pin(async move {
            Self::check(&failing)?;
            *stored.lock() = Some(api_key);
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'static, RepositoryResult<()>> {
        let stored = self.stored.clone();
        let failing = self.failing.clone();

        Box::pin(async move {
            Self::check(&failing)?;
            stored.lock().take();
            Ok(())
        })
    }
}
