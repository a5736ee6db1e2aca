use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// On-disk form of the stored credential
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    #[serde(default)]
    pub api_key: String,
}

/// Durable side channel for the API credential
pub trait ApiKeyRepository: Send + Sync + 'static {
    /// Load the stored key. `Ok(None)` when nothing has been stored.
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<String>>>;

    /// Store the key, replacing any previous value
    fn save(&self, api_key: String) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Forget the stored key
    fn clear(&self) -> BoxFuture<'static, RepositoryResult<()>>;
}
