use std::sync::Arc;
use std::time::Duration;

use super::device_code::{DeviceCodePoll, DeviceCodeSession};
use super::error::AuthError;
use super::provider::{OAuthClient, GRAPH_DEFAULT_SCOPE};
use super::source::{ClientCredentialsTokenSource, RefreshingTokenSource, TokenSource};
use crate::config::AppConfig;

/// Non-interactive authentication for command-line use.
///
/// Without a client secret it runs the device-authorization grant, which
/// needs the user to confirm a code in a browser. With a secret it runs the
/// client-credentials grant as the application itself. Neither path retries.
///
/// # Example
/// ```no_run
/// use graphkeys::auth::Authenticator;
/// use graphkeys::config::AppConfig;
///
/// # async fn example() -> Result<(), graphkeys::auth::AuthError> {
/// let auth = Authenticator::new(&AppConfig::default())?;
/// let tokens = auth
///     .authenticate(|session| eprintln!("{}", session.prompt()))
///     .await?;
/// let token = tokens.token().await?;
/// # Ok(())
/// # }
/// ```
pub struct Authenticator {
    client: Arc<OAuthClient>,
}

impl Authenticator {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        Ok(Self::with_client(OAuthClient::new(config)?))
    }

    pub fn with_client(client: OAuthClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Pick the grant from the configured credentials.
    ///
    /// `on_prompt` receives the device-code session so the caller can show
    /// the verification URL and code; it is not called for client
    /// credentials.
    pub async fn authenticate<F>(&self, on_prompt: F) -> Result<Arc<dyn TokenSource>, AuthError>
    where
        F: FnOnce(&DeviceCodeSession),
    {
        if self.client.has_client_secret() {
            self.client_credentials_grant().await
        } else {
            self.device_authorization_grant(on_prompt).await
        }
    }

    pub async fn device_authorization_grant<F>(
        &self,
        on_prompt: F,
    ) -> Result<Arc<dyn TokenSource>, AuthError>
    where
        F: FnOnce(&DeviceCodeSession),
    {
        let session = self.client.start_device_code().await?;
        on_prompt(&session);

        let mut interval = session.interval_secs;
        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            match self.client.poll_device_code(&session, interval).await? {
                DeviceCodePoll::Authorized { token } => {
                    tracing::info!("device authorization completed");
                    return Ok(Arc::new(RefreshingTokenSource::new(
                        self.client.clone(),
                        token,
                    )));
                }
                DeviceCodePoll::Pending { .. } => continue,
                DeviceCodePoll::SlowDown { interval_secs } => {
                    interval = interval_secs;
                }
                DeviceCodePoll::AccessDenied => return Err(AuthError::AccessDenied),
                DeviceCodePoll::Expired => return Err(AuthError::Expired),
            }
        }
    }

    pub async fn client_credentials_grant(&self) -> Result<Arc<dyn TokenSource>, AuthError> {
        let token = self.client.client_credentials(GRAPH_DEFAULT_SCOPE).await?;
        tracing::info!("client credentials grant completed");
        Ok(Arc::new(ClientCredentialsTokenSource::new(
            self.client.clone(),
            GRAPH_DEFAULT_SCOPE,
            Some(token),
        )))
    }
}
