use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::repositories::ApiKeyRepository;

/// Holds the active API key and mirrors changes to a durable repository.
///
/// Operations are total: repository failures are logged and the in-memory
/// value stays authoritative for the running session.
pub struct KeyStore {
    api_key: RwLock<String>,
    repository: Arc<dyn ApiKeyRepository>,
}

impl KeyStore {
    pub fn new(repository: Arc<dyn ApiKeyRepository>) -> Self {
        Self {
            api_key: RwLock::new(String::new()),
            repository,
        }
    }

    /// Current key, empty when none is configured
    pub fn get(&self) -> String {
        self.api_key.read().clone()
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.read().is_empty()
    }

    /// Hydrate memory from the durable store.
    ///
    /// Only a non-empty stored key is taken; an empty or missing one never
    /// overwrites what is already in memory.
    pub async fn load(&self) {
        match self.repository.load().await {
            Ok(Some(stored)) if !stored.is_empty() => {
                debug!("Loaded API key from storage");
                *self.api_key.write() = stored;
            }
            Ok(_) => debug!("No stored API key"),
            Err(e) => warn!(error = ?e, "Failed to load stored API key"),
        }
    }

    /// Set the key in memory and persist it
    pub async fn set(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        *self.api_key.write() = api_key.clone();

        if let Err(e) = self.repository.save(api_key).await {
            warn!(error = ?e, "Failed to persist API key");
        }
    }

    /// Forget the key in memory and in storage
    pub async fn remove(&self) {
        self.api_key.write().clear();

        if let Err(e) = self.repository.clear().await {
            warn!(error = ?e, "Failed to remove stored API key");
        }
    }
}
