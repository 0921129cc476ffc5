use thiserror::Error;

use charla_shared::PhoneError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status and an `{error}` body.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Phone(#[from] PhoneError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot determine data directory")]
    NoDataDir,

    #[error("No verification code has been sent")]
    NoPendingCode,

    #[error("Invalid event stream: {0}")]
    Stream(String),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
