use std::fmt::Write as _;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rand::Rng;

use super::error::FlowError;
use crate::auth::token;
use crate::auth::{OAuthClient, RefreshingTokenSource, TokenSource};
use crate::session::Session;

/// Successful outcome of an auth handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResponse {
    /// 302 to the given location.
    Redirect(String),
    /// 200 with a plain-text body.
    Text(String),
}

impl AuthResponse {
    fn redirect_or(redirect: Option<&str>, text: &str) -> Self {
        match redirect.filter(|r| !r.is_empty()) {
            Some(location) => Self::Redirect(location.to_string()),
            None => Self::Text(format!("{text}\n")),
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect(location) => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Self::Text(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response(),
        }
    }
}

/// Query parameters the provider sends back to the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: String,
    pub code: String,
    pub error: String,
    pub error_description: String,
}

/// 32 hex characters from 16 random bytes.
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Browser sign-in state machine over a cookie-keyed session.
///
/// A session moves from empty, to holding a nonce after `sign_in`, to
/// holding a token after a verified `callback`. `sign_out` drops the token.
pub struct AuthFlow {
    client: Arc<OAuthClient>,
}

impl AuthFlow {
    pub fn new(client: Arc<OAuthClient>) -> Self {
        Self { client }
    }

    /// Store a fresh nonce and the post-login redirect, then send the
    /// browser to the provider.
    pub fn sign_in(&self, session: &mut Session, redirect: &str) -> Result<AuthResponse, FlowError> {
        let nonce = generate_nonce();
        let data = session.data_mut();
        data.nonce = Some(nonce.clone());
        data.redirect = Some(redirect.to_string()).filter(|r| !r.is_empty());
        session.save()?;
        tracing::debug!(session_id = %session.id(), "starting sign-in");
        Ok(AuthResponse::Redirect(self.client.authorization_url(&nonce)))
    }

    /// Verify the returned state against the session nonce and exchange the
    /// code for a token.
    ///
    /// The nonce is removed before any check, so a replayed callback always
    /// fails with `MissingState`. Persisting that removal on the error path
    /// is the caller's job.
    pub async fn callback(
        &self,
        session: &mut Session,
        params: &CallbackParams,
    ) -> Result<AuthResponse, FlowError> {
        let nonce = session
            .data_mut()
            .take_nonce()
            .ok_or(FlowError::MissingState)?;
        if params.state != nonce {
            tracing::warn!(session_id = %session.id(), "callback state does not match nonce");
            return Err(FlowError::StateMismatch);
        }
        if !params.error.is_empty() {
            return Err(FlowError::Provider {
                error: params.error.clone(),
                description: params.error_description.clone(),
            });
        }

        let token = self.client.exchange_code(&params.code).await?;
        session.data_mut().token = Some(token::encode(&token)?);
        session.save()?;
        tracing::info!(session_id = %session.id(), "signed in");

        Ok(AuthResponse::redirect_or(
            session.data().redirect.as_deref(),
            "Signed in",
        ))
    }

    /// Return the session token as JSON, refreshing it first when expired.
    pub async fn token(&self, session: &mut Session) -> Result<AuthResponse, FlowError> {
        let blob = session
            .data()
            .token
            .as_deref()
            .ok_or(FlowError::Unauthenticated)?;
        let stored = token::decode(blob)?;

        let source = RefreshingTokenSource::new(self.client.clone(), stored);
        let current = source.token().await?;
        let encoded = token::encode(&current)?;
        session.data_mut().token = Some(encoded.clone());
        session.save()?;

        Ok(AuthResponse::Text(format!(
            "{}\n",
            String::from_utf8_lossy(&encoded)
        )))
    }

    /// Drop the token, keeping the rest of the session.
    pub fn sign_out(&self, session: &mut Session, redirect: &str) -> Result<AuthResponse, FlowError> {
        session.data_mut().token = None;
        session.save()?;
        tracing::info!(session_id = %session.id(), "signed out");
        Ok(AuthResponse::redirect_or(Some(redirect), "Signed out"))
    }
}
