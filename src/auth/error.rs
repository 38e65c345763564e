use thiserror::Error;

/// Normalized authentication errors across grants.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Device code expired before authorization completed")]
    Expired,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("{error}: {description}")]
    Grant { error: String, description: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidEndpoint(error.to_string())
    }
}
