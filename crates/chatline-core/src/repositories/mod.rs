pub mod api_key_json_repository;
pub mod api_key_repository;
pub mod engine_config_repository;
pub mod error;
pub mod in_memory_repository;
mod json_file;

pub use api_key_json_repository::ApiKeyJsonRepository;
pub use api_key_repository::{ApiKeyRecord, ApiKeyRepository, BoxFuture};
pub use engine_config_repository::{EngineConfigJsonRepository, EngineConfigRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::InMemoryApiKeyRepository;
