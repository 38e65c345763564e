use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::error::GraphError;
use crate::auth::TokenSource;

const OPEN_TYPE_EXTENSION: &str = "microsoft.graph.openTypeExtension";

/// Target of a directory request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    /// The principal the token was issued to.
    Me,
    /// A user by object id or user principal name.
    Id(String),
}

/// User record with its extensions expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

/// One extension on a user; everything besides `id` is kept as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct Extension {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl Extension {
    pub fn additional(&self, key: &str) -> Option<&Value> {
        self.additional.get(key)
    }
}

/// Body for creating or updating an open extension.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionPayload<'a> {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'a str,
    #[serde(rename = "extensionName")]
    pub extension_name: &'a str,
    pub value: &'a str,
}

impl<'a> ExtensionPayload<'a> {
    pub fn new(extension_name: &'a str, value: &'a str) -> Self {
        Self {
            odata_type: OPEN_TYPE_EXTENSION,
            extension_name,
            value,
        }
    }
}

/// Minimal Microsoft Graph client for user extensions.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl GraphClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>) -> Result<Self, GraphError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(GraphError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            tokens,
        })
    }

    /// Fetch the user's id and all of its extensions.
    pub async fn get_user(&self, user: &UserRef) -> Result<User, GraphError> {
        let mut url = self.user_url(user, &[])?;
        url.query_pairs_mut()
            .append_pair("$select", "id")
            .append_pair("$expand", "extensions");
        let resp = self.send(self.http.request(Method::GET, url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn add_extension(
        &self,
        user: &UserRef,
        payload: &ExtensionPayload<'_>,
    ) -> Result<(), GraphError> {
        let url = self.user_url(user, &["extensions"])?;
        self.send(self.http.request(Method::POST, url).json(payload))
            .await?;
        Ok(())
    }

    pub async fn update_extension(
        &self,
        user: &UserRef,
        name: &str,
        payload: &ExtensionPayload<'_>,
    ) -> Result<(), GraphError> {
        let url = self.user_url(user, &["extensions", name])?;
        self.send(self.http.request(Method::PATCH, url).json(payload))
            .await?;
        Ok(())
    }

    pub async fn delete_extension(&self, user: &UserRef, name: &str) -> Result<(), GraphError> {
        let url = self.user_url(user, &["extensions", name])?;
        self.send(self.http.request(Method::DELETE, url)).await?;
        Ok(())
    }

    fn user_url(&self, user: &UserRef, rest: &[&str]) -> Result<Url, GraphError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GraphError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            match user {
                UserRef::Me => {
                    segments.push("me");
                }
                UserRef::Id(id) => {
                    segments.push("users").push(id);
                }
            }
            segments.extend(rest);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, GraphError> {
        let token = self.tokens.token().await?;
        let resp = request
            .header("Authorization", token.authorization())
            .header("Accept", "application/json")
            .send()
            .await?;
        tracing::debug!(url = %resp.url(), status = %resp.status(), "graph request");
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn api_error(status: u16, body: &str) -> GraphError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => GraphError::Api {
            status,
            message: envelope
                .error
                .message
                .or_else(|| envelope.error.code.clone())
                .unwrap_or_else(|| body.to_string()),
            code: envelope.error.code,
        },
        Err(_) => GraphError::Api {
            status,
            code: None,
            message: body.trim().to_string(),
        },
    }
}
