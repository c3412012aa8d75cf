use thiserror::Error;

pub type Result<T> = std::result::Result<T, BypassError>;

#[derive(Debug, Error)]
pub enum BypassError {
    /// Timeout, refused connection, DNS or TLS failure for a single probe
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("classification error: {0}")]
    Classification(String),

    /// Startup-time problem: malformed technique, bad header name, unknown verb...
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid target {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BypassError {
    pub fn config(msg: impl Into<String>) -> Self {
        BypassError::Configuration(msg.into())
    }

    pub fn invalid_target(url: &str, reason: impl Into<String>) -> Self {
        BypassError::InvalidTarget {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that only mean "this technique did not work".
    pub fn is_transport(&self) -> bool {
        matches!(self, BypassError::Transport(_))
    }
}
