//! Error types for graphkeys.

pub mod unified;

pub use unified::ErrorCategory;

use thiserror::Error;

use crate::auth::AuthError;
use crate::graph::GraphError;
use crate::session::SessionError;

/// Primary error type reported by the command-line entry points.
#[derive(Error, Debug)]
pub enum KeysError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl KeysError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Auth(AuthError::Network(_)) => ErrorCategory::Network,
            Self::Auth(_) => ErrorCategory::Authentication,
            Self::Graph(GraphError::MalformedExtension(_)) => ErrorCategory::MalformedData,
            Self::Graph(GraphError::Network(_)) => ErrorCategory::Network,
            Self::Graph(GraphError::Auth(_)) => ErrorCategory::Authentication,
            Self::Graph(GraphError::InvalidUrl(_)) => ErrorCategory::Configuration,
            Self::Graph(GraphError::Api { status, .. }) => match status {
                401 | 403 => ErrorCategory::Authentication,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                _ => ErrorCategory::Api,
            },
            Self::Session(_) | Self::Io(_) => ErrorCategory::Io,
            Self::Server(_) => ErrorCategory::Unknown,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, KeysError>;
