//! Error types for the credential transport.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while authorizing and sending requests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OAuthError {
    /// Network/HTTP error from the base transport.
    #[error("Network error: {0}")]
    Network(String),

    /// An upstream component reported a failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Fetching a new token failed.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// The request cannot be authorized as given.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OAuthError {
    /// Check if this error came from token acquisition.
    pub fn is_refresh_error(&self) -> bool {
        matches!(self, OAuthError::Refresh(_))
    }

    /// Check if this error came from the network.
    pub fn is_network_error(&self) -> bool {
        matches!(self, OAuthError::Network(_))
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(e: serde_json::Error) -> Self {
        OAuthError::Serialization(e.to_string())
    }
}
