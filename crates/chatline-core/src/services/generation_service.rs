use std::fmt;

use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use super::api_client::ApiClient;
use super::error::{ServiceError, ServiceResult};
use super::utf8_decoder::Utf8ChunkDecoder;
use crate::models::ChatMessage;
use crate::repositories::BoxFuture;
use crate::settings::AdvancedSettings;

/// Streamed reply text, one item per received chunk
pub type TextStream = BoxStream<'static, ServiceResult<String>>;

/// Body of a generation request
#[derive(Clone, Serialize)]
pub struct GenerationRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub settings: AdvancedSettings,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Black-box text generator
pub trait GenerationService: Send + Sync + 'static {
    /// Issue the request. Resolves once the response head has arrived; the
    /// body is then read chunk by chunk from the returned stream.
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'static, ServiceResult<TextStream>>;
}

/// Generation service reached over HTTP; the response body is raw UTF-8 text
pub struct HttpGenerationService {
    client: ApiClient,
    path: String,
}

impl HttpGenerationService {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

impl GenerationService for HttpGenerationService {
    fn generate(&self, request: GenerationRequest) -> BoxFuture<'static, ServiceResult<TextStream>> {
        let client = self.client.clone();
        let path = self.path.clone();

        Box::pin(async move {
            debug!(model = %request.model, messages = request.messages.len(), "Requesting generation");
            let response = client.send_json(Method::POST, &path, &request).await?;
            let mut body = Box::pin(response.bytes_stream());

            let stream: TextStream = Box::pin(async_stream::stream! {
                let mut decoder = Utf8ChunkDecoder::new();
                while let Some(chunk) = body.next().await {
                    match chunk {
                        Ok(bytes) => {
                            let text = decoder.push(&bytes);
                            if !text.is_empty() {
                                yield Ok(text);
                            }
                        }
                        Err(e) => {
                            yield Err(ServiceError::from(e));
                            return;
                        }
                    }
                }
                let tail = decoder.finish();
                if !tail.is_empty() {
                    yield Ok(tail);
                }
            });

            Ok(stream)
        })
    }
}
