use thiserror::Error;

/// Failure taxonomy shared by catalog fetches, version probes and image loads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    #[error("invalid catalog format: {0}")]
    InvalidFormat(String),

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            FetchError::Transport("request timed out".to_string())
        } else if let Some(status) = value.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport(value.to_string())
        }
    }
}

impl FetchError {
    /// Short machine-readable label, used in logs and status payloads
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Http { .. } => "http",
            FetchError::InvalidFormat(_) => "invalid_format",
            FetchError::Decode(_) => "decode",
            FetchError::UnknownCollection(_) => "unknown_collection",
        }
    }
}
