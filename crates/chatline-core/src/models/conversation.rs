use serde::{Deserialize, Serialize};

use crate::settings::{AdvancedSettings, GenerationSettings};

/// A conversation record as listed in the sidebar.
///
/// Per-conversation settings are optional; anything missing is resolved
/// against the global defaults when a turn starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub advanced_settings: Option<AdvancedSettings>,
}

impl Conversation {
    /// Create an untitled conversation that inherits every setting
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            model: None,
            system_prompt: None,
            advanced_settings: None,
        }
    }

    /// Create an untitled conversation pinned to the given settings
    pub fn with_settings(id: impl Into<String>, settings: &GenerationSettings) -> Self {
        Self {
            id: id.into(),
            title: None,
            model: Some(settings.model.clone()),
            system_prompt: Some(settings.system_prompt.clone()),
            advanced_settings: Some(settings.advanced_settings.clone()),
        }
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Resolve this conversation's settings, field by field, against `defaults`
    pub fn generation_settings(&self, defaults: &GenerationSettings) -> GenerationSettings {
        GenerationSettings {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.clone()),
            system_prompt: self
                .system_prompt
                .clone()
                .unwrap_or_else(|| defaults.system_prompt.clone()),
            advanced_settings: self
                .advanced_settings
                .clone()
                .unwrap_or_else(|| defaults.advanced_settings.clone()),
        }
    }
}
