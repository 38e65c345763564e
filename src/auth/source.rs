use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::AuthError;
use super::provider::OAuthClient;
use super::token::Token;

/// Yields a currently valid access token, refreshing behind the scenes.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<Token, AuthError>;
}

/// Holds a user token and renews it with its refresh token once expired.
pub struct RefreshingTokenSource {
    client: Arc<OAuthClient>,
    current: Mutex<Token>,
}

impl RefreshingTokenSource {
    pub fn new(client: Arc<OAuthClient>, token: Token) -> Self {
        Self {
            client,
            current: Mutex::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for RefreshingTokenSource {
    async fn token(&self) -> Result<Token, AuthError> {
        let mut current = self.current.lock().await;
        if current.is_valid() {
            return Ok(current.clone());
        }
        tracing::debug!("access token expired, refreshing");
        let refreshed = self.client.refresh(&current).await?;
        *current = refreshed.clone();
        Ok(refreshed)
    }
}

/// Re-runs the client-credentials grant whenever the cached token expires.
pub struct ClientCredentialsTokenSource {
    client: Arc<OAuthClient>,
    scope: String,
    cached: Mutex<Option<Token>>,
}

impl ClientCredentialsTokenSource {
    pub fn new(client: Arc<OAuthClient>, scope: impl Into<String>, initial: Option<Token>) -> Self {
        Self {
            client,
            scope: scope.into(),
            cached: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn token(&self) -> Result<Token, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }
        let token = self.client.client_credentials(&self.scope).await?;
        *cached = Some(token.clone());
        Ok(token)
    }
}
