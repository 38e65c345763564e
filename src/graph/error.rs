use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("No string value in extension {0}")]
    MalformedExtension(String),
    #[error("Invalid Graph URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl GraphError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT.as_u16())
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

impl From<url::ParseError> for GraphError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}
