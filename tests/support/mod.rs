#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use graphkeys::auth::{AuthError, OAuthClient, Token, TokenSource};
use graphkeys::config::AppConfig;
use graphkeys::session::{MemorySessionStore, SessionStore};
use graphkeys::web::{cookie_key, router, AppState};
use tokio::net::TcpListener;

pub const REDIRECT_URI: &str = "http://localhost:8080/auth/callback";

/// Hands out the same token forever.
pub struct StaticTokenSource(pub Token);

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Token, AuthError> {
        Ok(self.0.clone())
    }
}

pub fn static_tokens(access_token: &str) -> Arc<dyn TokenSource> {
    Arc::new(StaticTokenSource(fresh_token(access_token, None)))
}

pub fn fresh_token(access_token: &str, refresh_token: Option<&str>) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expiry: Some(Utc::now() + Duration::hours(1)),
    }
}

pub fn expired_token(access_token: &str, refresh_token: &str) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some(refresh_token.to_string()),
        expiry: Some(Utc::now() - Duration::minutes(5)),
    }
}

/// Config pointing the identity provider and Graph at a mock server.
pub fn app_config(server_uri: &str) -> AppConfig {
    AppConfig {
        authority_url: server_uri.to_string(),
        graph_url: format!("{server_uri}/v1.0"),
        ..AppConfig::default()
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve the auth router on an ephemeral port with in-memory sessions.
pub async fn spawn_app(provider_uri: &str) -> TestApp {
    spawn_app_with_limit(provider_uri, 16384).await
}

/// Like `spawn_app`, with sessions capped at `max_length` encoded bytes.
pub async fn spawn_app_with_limit(provider_uri: &str, max_length: usize) -> TestApp {
    let client = OAuthClient::new(&app_config(provider_uri))
        .expect("oauth client")
        .with_redirect_uri(REDIRECT_URI);
    let sessions = Arc::new(MemorySessionStore::new(max_length));
    let store: Arc<dyn SessionStore> = sessions.clone();
    let state = AppState::new(client, store, cookie_key(Some("test-secret")).expect("key"));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    TestApp { addr, sessions }
}

/// Browser stand-in: keeps cookies, never follows redirects.
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}
