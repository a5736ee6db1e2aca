use serde::{Deserialize, Serialize};
use tracing::info;

use super::generation_settings::GenerationSettings;

/// Environment variable that overrides `base_url`
pub const BASE_URL_ENV: &str = "CHATLINE_BASE_URL";

pub const DEFAULT_FALLBACK_MESSAGE: &str = "Oops! Something went wrong. Please try again.";

/// Where the collaborating services live and how turns are composed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_url: String,
    pub generate_path: String,
    pub title_path: String,
    pub message_path: String,
    /// Written into the assistant message when generation fails
    pub fallback_message: String,
    /// Settings used when the active conversation has none of its own
    pub defaults: GenerationSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            generate_path: "/api/openai/chat".to_string(),
            title_path: "/api/openai/chat-title".to_string(),
            message_path: "/api/supabase/message".to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            defaults: GenerationSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            info!(base_url = %url, "Using base URL from environment");
            self.base_url = url.trim().to_string();
        }
    }
}
