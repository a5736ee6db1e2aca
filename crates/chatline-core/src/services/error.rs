use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No data in response")]
    EmptyBody,

    #[error("Request cancelled")]
    Cancelled,
}

pub type ServiceResult<T> = Result<T, ServiceError>;
