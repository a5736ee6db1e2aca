use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_client::ApiClient;
use super::error::ServiceResult;
use crate::models::ChatMessage;
use crate::repositories::BoxFuture;

const MAX_TITLE_CHARS: usize = 100;

/// Body of a title request
#[derive(Clone, Serialize)]
pub struct TitleRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "chatID")]
    pub chat_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct TitleResponse {
    #[serde(default)]
    title: Option<String>,
}

/// Summarizes the first exchange of a conversation into a title
pub trait TitleService: Send + Sync + 'static {
    /// Raw title as returned by the service, `None` when it produced none
    fn generate_title(&self, request: TitleRequest) -> BoxFuture<'static, ServiceResult<Option<String>>>;
}

pub struct HttpTitleService {
    client: ApiClient,
    path: String,
}

impl HttpTitleService {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

impl TitleService for HttpTitleService {
    fn generate_title(&self, request: TitleRequest) -> BoxFuture<'static, ServiceResult<Option<String>>> {
        let client = self.client.clone();
        let path = self.path.clone();

        Box::pin(async move {
            debug!(chat_id = %request.chat_id, "Requesting conversation title");
            let response = client.send_json(Method::POST, &path, &request).await?;
            let body: TitleResponse = response.json().await?;
            Ok(body.title)
        })
    }
}

/// Clean a generated title.
///
/// Trims whitespace and surrounding quotes, keeps the first line and clamps
/// overly long titles. Returns `None` when nothing usable is left.
pub fn clean_title(raw_title: &str) -> Option<String> {
    let cleaned = raw_title
        .trim()
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();

    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = cleaned.chars().take(MAX_TITLE_CHARS - 3).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(cleaned.to_string())
    }
}
