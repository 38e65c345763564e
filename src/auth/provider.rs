use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use url::Url;

use super::device_code::{DeviceCodePoll, DeviceCodeSession};
use super::error::AuthError;
use super::token::Token;
use crate::config::AppConfig;

/// Scopes requested by the browser and device-code flows.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "offline_access", "User.ReadWrite"];
/// Application-level scope for the client-credentials grant.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

/// Authorization, token and device-code endpoints of one tenant.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize_url: Url,
    pub token_url: Url,
    pub device_code_url: Url,
}

impl OAuthEndpoints {
    /// Microsoft identity platform v2 endpoints under `authority` for `tenant`.
    pub fn for_tenant(authority: &str, tenant: &str) -> Result<Self, AuthError> {
        let base = format!("{}/{}/oauth2/v2.0/", authority.trim_end_matches('/'), tenant);
        let base = Url::parse(&base)?;
        Ok(Self {
            authorize_url: base.join("authorize")?,
            token_url: base.join("token")?,
            device_code_url: base.join("devicecode")?,
        })
    }
}

/// OAuth2 client for one registered application.
///
/// # Example
/// ```
/// use graphkeys::auth::OAuthClient;
/// use graphkeys::config::AppConfig;
///
/// let client = OAuthClient::new(&AppConfig::default())?
///     .with_redirect_uri("http://localhost:8080/auth/callback");
/// let url = client.authorization_url("0123456789abcdef0123456789abcdef");
/// assert!(url.contains("state=0123456789abcdef0123456789abcdef"));
/// # Ok::<(), graphkeys::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    endpoints: OAuthEndpoints,
}

impl OAuthClient {
    pub fn new(config: &AppConfig) -> Result<Self, AuthError> {
        Ok(Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            endpoints: OAuthEndpoints::for_tenant(&config.authority_url, &config.tenant_id)?,
        })
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn has_client_secret(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Provider URL that starts an authorization-code grant carrying `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.endpoints.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", "code");
            if let Some(redirect_uri) = &self.redirect_uri {
                query.append_pair("redirect_uri", redirect_uri);
            }
            query
                .append_pair("scope", &self.scopes.join(" "))
                .append_pair("state", state);
        }
        url.into()
    }

    /// Exchange an authorization code for a token.
    pub async fn exchange_code(&self, code: &str) -> Result<Token, AuthError> {
        let mut params = vec![("grant_type", "authorization_code"), ("code", code)];
        if let Some(redirect_uri) = &self.redirect_uri {
            params.push(("redirect_uri", redirect_uri.as_str()));
        }
        self.token_request(params, None).await
    }

    /// Trade the refresh token of `token` for a fresh token.
    ///
    /// The old refresh token is carried over when the provider does not
    /// rotate it. A missing or rejected refresh token is
    /// `ExpiredOrInvalidGrant`.
    pub async fn refresh(&self, token: &Token) -> Result<Token, AuthError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::ExpiredOrInvalidGrant)?;
        self.token_request(
            vec![
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            token.refresh_token.as_deref(),
        )
        .await
        .map_err(|err| match err {
            AuthError::Grant { ref error, .. } if error == "invalid_grant" => {
                tracing::debug!(error = %err, "refresh token rejected");
                AuthError::ExpiredOrInvalidGrant
            }
            other => other,
        })
    }

    /// Client-credentials grant for `scope`. Requires a client secret.
    pub async fn client_credentials(&self, scope: &str) -> Result<Token, AuthError> {
        if self.client_secret.is_none() {
            return Err(AuthError::InvalidResponse(
                "client credentials grant requires a client secret".to_string(),
            ));
        }
        self.token_request(
            vec![("grant_type", "client_credentials"), ("scope", scope)],
            None,
        )
        .await
    }

    pub async fn start_device_code(&self) -> Result<DeviceCodeSession, AuthError> {
        let scope = self.scopes.join(" ");
        let resp = self
            .http
            .post(self.endpoints.device_code_url.clone())
            .header("Accept", "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(grant_error(&body).unwrap_or_else(|| {
                AuthError::InvalidResponse(format!(
                    "Device code request failed with status {status}"
                ))
            }));
        }
        let payload: DeviceCodeResponse = resp.json().await?;
        let expires_in = i64::try_from(payload.expires_in).map_err(|_| {
            AuthError::InvalidResponse(format!(
                "device code expires_in {} out of range",
                payload.expires_in
            ))
        })?;
        Ok(DeviceCodeSession {
            verification_url: payload.verification_uri,
            user_code: payload.user_code,
            device_code: payload.device_code,
            message: payload.message,
            interval_secs: payload.interval,
            expires_at: expiry_after(expires_in)?,
        })
    }

    /// Poll the token endpoint once. `interval_secs` is the interval the
    /// caller currently waits between polls; `slow_down` adds 5 s to it.
    pub async fn poll_device_code(
        &self,
        session: &DeviceCodeSession,
        interval_secs: u64,
    ) -> Result<DeviceCodePoll, AuthError> {
        if Utc::now() >= session.expires_at {
            return Ok(DeviceCodePoll::Expired);
        }
        let resp = self
            .http
            .post(self.endpoints.token_url.clone())
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
                ("client_id", self.client_id.as_str()),
                ("device_code", session.device_code.as_str()),
            ])
            .send()
            .await?;
        if resp.status().is_success() {
            let payload: TokenResponse = resp.json().await?;
            return Ok(DeviceCodePoll::Authorized {
                token: payload.into_token(None)?,
            });
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match grant_error(&body) {
            Some(AuthError::Grant { error, description }) => match error.as_str() {
                "authorization_pending" => Ok(DeviceCodePoll::Pending { interval_secs }),
                "slow_down" => Ok(DeviceCodePoll::SlowDown {
                    interval_secs: interval_secs.saturating_add(SLOW_DOWN_INCREMENT_SECS),
                }),
                "expired_token" | "code_expired" => Ok(DeviceCodePoll::Expired),
                "access_denied" | "authorization_declined" => Ok(DeviceCodePoll::AccessDenied),
                _ => Err(AuthError::Grant { error, description }),
            },
            _ => Err(AuthError::InvalidResponse(format!(
                "Device token request failed with status {status}"
            ))),
        }
    }

    async fn token_request(
        &self,
        params: Vec<(&str, &str)>,
        previous_refresh: Option<&str>,
    ) -> Result<Token, AuthError> {
        tracing::debug!(url = %self.endpoints.token_url, "oauth token request");
        let resp = self
            .http
            .post(self.endpoints.token_url.clone())
            .header("Accept", "application/json")
            .form(&self.with_client_auth(params))
            .send()
            .await?;
        Self::read_token(resp, previous_refresh).await
    }

    fn with_client_auth<'a>(&'a self, mut params: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        params.push(("client_id", self.client_id.as_str()));
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        params
    }

    async fn read_token(
        resp: reqwest::Response,
        previous_refresh: Option<&str>,
    ) -> Result<Token, AuthError> {
        let status = resp.status();
        if status.is_success() {
            let payload: TokenResponse = resp.json().await?;
            if payload.access_token.is_empty() {
                return Err(AuthError::InvalidResponse(
                    "token response carried no access_token".to_string(),
                ));
            }
            return payload.into_token(previous_refresh);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(grant_error(&body).unwrap_or_else(|| {
            AuthError::InvalidResponse(format!("Token request failed with status {status}"))
        }))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<&str>) -> Result<Token, AuthError> {
        let expiry = self
            .expires_in
            .filter(|secs| *secs > 0)
            .map(expiry_after)
            .transpose()?;
        Ok(Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .or_else(|| previous_refresh.map(str::to_string)),
            expiry,
        })
    }
}

/// `now + secs`, rejecting lifetimes the clock cannot represent.
fn expiry_after(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Duration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::InvalidResponse(format!("expires_in {secs} out of range")))
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn grant_error(body: &str) -> Option<AuthError> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    Some(AuthError::Grant {
        error: parsed.error,
        description: parsed.error_description.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(&AppConfig::default())
            .unwrap()
            .with_redirect_uri("http://localhost:8080/auth/callback")
    }

    #[test]
    fn endpoints_follow_tenant() {
        let endpoints =
            OAuthEndpoints::for_tenant("https://login.microsoftonline.com/", "contoso").unwrap();
        assert_eq!(
            endpoints.authorize_url.as_str(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/authorize"
        );
        assert_eq!(
            endpoints.token_url.as_str(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
        assert_eq!(
            endpoints.device_code_url.as_str(),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/devicecode"
        );
    }

    #[test]
    fn authorization_url_carries_state_and_scopes() {
        let url = Url::parse(&client().authorization_url("abc123")).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".into(), "abc123".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&(
            "scope".into(),
            "openid offline_access User.ReadWrite".into()
        )));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8080/auth/callback".into()
        )));
    }

    #[test]
    fn token_response_keeps_previous_refresh_token() {
        let payload = TokenResponse {
            access_token: "new".into(),
            token_type: "Bearer".into(),
            refresh_token: None,
            expires_in: Some(3600),
        };
        let token = payload.into_token(Some("old-refresh")).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert!(token.is_valid());
    }

    #[test]
    fn unrepresentable_lifetime_is_invalid_response() {
        let payload = TokenResponse {
            access_token: "a".into(),
            token_type: "Bearer".into(),
            refresh_token: None,
            expires_in: Some(9_000_000_000_000_000),
        };
        assert!(matches!(
            payload.into_token(None),
            Err(AuthError::InvalidResponse(_))
        ));
        assert!(expiry_after(i64::MAX).is_err());
        assert!(expiry_after(3600).is_ok());
    }

    #[test]
    fn grant_error_parses_provider_body() {
        let err = grant_error(r#"{"error":"invalid_grant","error_description":"AADSTS70008"}"#);
        match err {
            Some(AuthError::Grant { error, description }) => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description, "AADSTS70008");
            }
            other => panic!("expected Grant, got {other:?}"),
        }
        assert!(grant_error("<html>").is_none());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_is_invalid_grant() {
        let result = client().refresh(&Token::bearer("a")).await;
        assert!(matches!(result, Err(AuthError::ExpiredOrInvalidGrant)));
    }
}
