mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use graphkeys::auth::{AuthError, Authenticator, OAuthClient, RefreshingTokenSource, TokenSource};
use graphkeys::config::AppConfig;
use support::app_config;

const DEVICE_CODE_PATH: &str = "/common/oauth2/v2.0/devicecode";
const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(DEVICE_CODE_PATH))
        .and(body_string_contains("scope=openid+offline_access+User.ReadWrite"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "device-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 0,
            "message": "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code ABCD-EFGH to authenticate."
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_poll_error(server: &MockServer, error: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("device_code=device-123"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": error,
            "error_description": format!("AADSTS: {error}")
        })))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

fn authenticator(config: &AppConfig) -> Authenticator {
    Authenticator::new(config).expect("authenticator")
}

#[tokio::test]
async fn device_grant_polls_until_authorized() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_poll_error(&server, "authorization_pending", 2).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "device-access",
            "token_type": "Bearer",
            "refresh_token": "device-refresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prompts = AtomicUsize::new(0);
    let tokens = authenticator(&app_config(&server.uri()))
        .authenticate(|session| {
            assert_eq!(session.user_code, "ABCD-EFGH");
            assert!(session.prompt().contains("ABCD-EFGH"));
            prompts.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .expect("device grant");
    assert_eq!(prompts.load(Ordering::SeqCst), 1);

    let token = tokens.token().await.unwrap();
    assert_eq!(token.access_token, "device-access");
    assert_eq!(token.refresh_token.as_deref(), Some("device-refresh"));
}

#[tokio::test(start_paused = true)]
async fn repeated_slow_down_keeps_growing_interval() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_poll_error(&server, "slow_down", 2).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("device_code=device-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "slow-access",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let started = tokio::time::Instant::now();
    let tokens = authenticator(&app_config(&server.uri()))
        .authenticate(|_| {})
        .await
        .expect("device grant");
    // 0 s, then 5 s after the first slow_down, then 10 s after the second.
    assert!(started.elapsed() >= std::time::Duration::from_secs(15));
    assert_eq!(tokens.token().await.unwrap().access_token, "slow-access");
}

#[tokio::test]
async fn device_grant_denied_fails() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_poll_error(&server, "authorization_declined", 1).await;

    let err = authenticator(&app_config(&server.uri()))
        .authenticate(|_| {})
        .await
        .err()
        .expect("denied");
    assert!(matches!(err, AuthError::AccessDenied));
}

#[tokio::test]
async fn device_grant_expired_fails() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_poll_error(&server, "expired_token", 1).await;

    let err = authenticator(&app_config(&server.uri()))
        .authenticate(|_| {})
        .await
        .err()
        .expect("expired");
    assert!(matches!(err, AuthError::Expired));
}

#[tokio::test]
async fn device_grant_unknown_error_is_reported() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    mount_poll_error(&server, "invalid_client", 1).await;

    let err = authenticator(&app_config(&server.uri()))
        .authenticate(|_| {})
        .await
        .err()
        .expect("invalid client");
    assert!(matches!(err, AuthError::Grant { ref error, .. } if error == "invalid_client"));
}

#[tokio::test]
async fn client_secret_selects_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains(
            "scope=https%3A%2F%2Fgraph.microsoft.com%2F.default",
        ))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "app-access",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DEVICE_CODE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let config = AppConfig {
        client_secret: Some("s3cret".into()),
        ..app_config(&server.uri())
    };
    let tokens = authenticator(&config)
        .authenticate(|_| panic!("no prompt for client credentials"))
        .await
        .expect("client credentials");

    // Cached while valid: a second call does not hit the token endpoint.
    assert_eq!(tokens.token().await.unwrap().access_token, "app-access");
    assert_eq!(tokens.token().await.unwrap().access_token, "app-access");
}

#[tokio::test]
async fn client_credentials_rejection_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AppConfig {
        client_secret: Some("wrong".into()),
        ..app_config(&server.uri())
    };
    let err = authenticator(&config)
        .authenticate(|_| {})
        .await
        .err()
        .expect("rejected");
    assert_eq!(
        err.to_string(),
        "invalid_client: AADSTS7000215: Invalid client secret provided."
    );
}

#[tokio::test]
async fn refreshing_source_renews_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "refresh_token": "rt-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(OAuthClient::new(&app_config(&server.uri())).unwrap());
    let source = RefreshingTokenSource::new(client, support::expired_token("stale", "rt-1"));
    let first = source.token().await.unwrap();
    let second = source.token().await.unwrap();
    assert_eq!(first.access_token, "renewed");
    assert_eq!(second.refresh_token.as_deref(), Some("rt-2"));
}
