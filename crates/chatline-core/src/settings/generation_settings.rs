use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are chatline, a helpful AI assistant.";

/// Sampling parameters forwarded verbatim to the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub n: u32,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 1000,
            stream: true,
            n: 1,
        }
    }
}

/// Model, system prompt and sampling parameters for one turn.
///
/// Used as the global default for new chats and as the resolved settings
/// of the active conversation at turn start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub system_prompt: String,
    #[serde(default)]
    pub advanced_settings: AdvancedSettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            advanced_settings: AdvancedSettings::default(),
        }
    }
}
