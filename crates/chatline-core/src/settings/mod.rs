pub mod engine_config;
pub mod generation_settings;
pub mod key_store;

pub use engine_config::{BASE_URL_ENV, DEFAULT_FALLBACK_MESSAGE, EngineConfig};
pub use generation_settings::{
    AdvancedSettings, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, GenerationSettings,
};
pub use key_store::KeyStore;
