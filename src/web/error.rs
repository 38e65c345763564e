use std::fmt;
use std::io::ErrorKind;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::AuthError;
use crate::session::SessionError;

/// Everything an auth handler can fail with.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Callback arrived without a nonce in the session.
    #[error("No state cookie present")]
    MissingState,
    #[error("State verification failed")]
    StateMismatch,
    /// The provider redirected back with `error` set.
    #[error("{error}\n{description}\n")]
    Provider { error: String, description: String },
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Unhandled path: {0}")]
    UnhandledPath(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Token(#[from] AuthError),
    #[error(transparent)]
    Opaque(Box<dyn std::error::Error + Send + Sync>),
}

impl FlowError {
    /// Map any failure to exactly one status and response text.
    pub fn classify(&self) -> HttpError {
        let status = match self {
            Self::MissingState | Self::StateMismatch | Self::Provider { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated | Self::Token(AuthError::ExpiredOrInvalidGrant) => {
                StatusCode::UNAUTHORIZED
            }
            Self::UnhandledPath(_) => StatusCode::NOT_FOUND,
            Self::Session(SessionError::Io(err)) => io_status(err.kind()),
            Self::Opaque(err) => match err.downcast_ref::<std::io::Error>() {
                Some(io) => io_status(io.kind()),
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Session(_) | Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "auth handler failed");
        }
        HttpError::new(status, self.to_string())
    }
}

fn io_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Classified failure, rendered as `<code> <status text>\n<text>\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub text: String,
}

impl HttpError {
    pub fn new(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}\n{}\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or_default(),
            self.text
        )
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            self.to_string(),
        )
            .into_response()
    }
}
