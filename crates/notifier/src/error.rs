use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("authentication failed with HTTP {status}")]
    Status { status: StatusCode },

    #[error("malformed token response: {reason}")]
    Parse { reason: String },
}

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("authentication error: {source}")]
    Auth {
        #[from]
        source: AuthError,
    },

    #[error("network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("upload failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("all {attempts} upload attempts exhausted")]
    RetriesExhausted { attempts: u32 },

    #[error("malformed upload response: {reason}")]
    MalformedResponse { reason: String },
}
