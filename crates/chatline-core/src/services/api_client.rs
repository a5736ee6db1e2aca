use reqwest::{Method, Response};
use serde::Serialize;
use tracing::debug;

use super::error::{ServiceError, ServiceResult};

/// Shared HTTP client for the collaborating services.
///
/// `reqwest::Client` is internally reference-counted, so cloning is cheap.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ServiceResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Join `path` onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send a JSON body and fail on any non-2xx status
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ServiceResult<Response> {
        let url = self.url(path);
        debug!(%method, url = %url, "Sending request");

        let response = self.client.request(method, &url).json(body).send().await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}
