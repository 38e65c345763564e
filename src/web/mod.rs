//! Browser sign-in endpoints under `/auth/`.

pub mod error;
pub mod flow;
pub mod handler;

pub use error::{FlowError, HttpError};
pub use flow::{generate_nonce, AuthFlow, AuthResponse, CallbackParams};
pub use handler::{AuthForm, AuthRoute, SESSION_COOKIE};

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::any;
use axum::Router;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tokio::net::TcpListener;

use crate::auth::OAuthClient;
use crate::config::{AppConfig, ServeConfig};
use crate::error::{KeysError, Result};
use crate::session::{FileSessionStore, SessionStore};

/// Shared state for the auth handlers.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthFlow>,
    pub sessions: Arc<dyn SessionStore>,
    pub cookie_key: Key,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(client: OAuthClient, sessions: Arc<dyn SessionStore>, cookie_key: Key) -> Self {
        Self {
            flow: Arc::new(AuthFlow::new(Arc::new(client))),
            sessions,
            cookie_key,
            secure_cookies: false,
        }
    }

    /// State for `serve`: file-backed sessions and a redirect-aware client.
    pub fn from_config(app: &AppConfig, serve: &ServeConfig) -> Result<Self> {
        let client = OAuthClient::new(app)?.with_redirect_uri(serve.redirect_uri.clone());
        let sessions = Arc::new(FileSessionStore::new(
            serve.session_dir.clone(),
            serve.session_max_length,
        ));
        let mut state = Self::new(client, sessions, cookie_key(serve.session_key.as_deref())?);
        state.secure_cookies = serve.redirect_uri.starts_with("https://");
        Ok(state)
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Cookie signing key derived from the configured secret.
///
/// Without a secret a random key is used, so cookies issued by one process
/// are not accepted by the next.
pub fn cookie_key(secret: Option<&str>) -> Result<Key> {
    match secret {
        Some(secret) => {
            let digest = Sha512::digest(secret.as_bytes());
            Key::try_from(digest.as_slice())
                .map_err(|err| KeysError::Configuration(format!("invalid session key: {err}")))
        }
        None => {
            tracing::warn!("no session key configured; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/", any(handler::handle_auth))
        .route("/auth/{*path}", any(handler::handle_auth))
        .with_state(state)
}

/// Run the HTTP server until ctrl-c.
pub async fn serve(app: &AppConfig, config: &ServeConfig) -> Result<()> {
    let state = AppState::from_config(app, config)?;
    let bind = config.bind_addr();
    let listener = TcpListener::bind(bind.as_str())
        .await
        .map_err(|err| KeysError::Server(format!("failed to bind {bind}: {err}")))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        redirect_uri = %config.redirect_uri,
        session_dir = %config.session_dir.display(),
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|err| KeysError::Server(format!("server exited unexpectedly: {err}")))?;
    tracing::info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_gives_same_key() {
        let a = cookie_key(Some("hunter2")).unwrap();
        let b = cookie_key(Some("hunter2")).unwrap();
        let c = cookie_key(Some("other")).unwrap();
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }

    #[test]
    fn missing_secret_generates_key() {
        assert!(cookie_key(None).is_ok());
    }
}
