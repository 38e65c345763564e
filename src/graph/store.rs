use std::collections::HashMap;
use std::sync::Arc;

use super::client::{ExtensionPayload, GraphClient, UserRef};
use super::error::GraphError;
use crate::auth::TokenSource;
use crate::config::AppConfig;

/// Get/set/delete of a single string value kept in a user extension.
pub struct AttributeStore {
    client: GraphClient,
    login_map: HashMap<String, String>,
}

impl AttributeStore {
    pub fn new(client: GraphClient, login_map: HashMap<String, String>) -> Self {
        Self { client, login_map }
    }

    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, GraphError> {
        let client = GraphClient::new(&config.graph_url, tokens)?;
        Ok(Self::new(client, config.login_map.clone()))
    }

    /// An empty login targets the caller; otherwise the login map is
    /// consulted, falling back to the login itself.
    pub fn resolve(&self, login: &str) -> UserRef {
        if login.is_empty() {
            return UserRef::Me;
        }
        let id = self
            .login_map
            .get(login)
            .cloned()
            .unwrap_or_else(|| login.to_string());
        UserRef::Id(id)
    }

    /// Value of extension `name`, or `None` when the user has no such
    /// extension.
    pub async fn get(&self, user: &UserRef, name: &str) -> Result<Option<String>, GraphError> {
        let record = self.client.get_user(user).await?;
        let Some(extension) = record
            .extensions
            .iter()
            .find(|ext| ext.id.as_deref() == Some(name))
        else {
            return Ok(None);
        };
        match extension.additional("value") {
            Some(serde_json::Value::String(value)) => Ok(Some(value.clone())),
            _ => Err(GraphError::MalformedExtension(name.to_string())),
        }
    }

    /// Create extension `name`; when it already exists, update it instead.
    pub async fn set(&self, user: &UserRef, name: &str, value: &str) -> Result<(), GraphError> {
        let payload = ExtensionPayload::new(name, value);
        match self.client.add_extension(user, &payload).await {
            Ok(()) => {
                tracing::info!(extension = name, "extension created");
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                tracing::debug!(extension = name, "extension exists, updating");
                self.client.update_extension(user, name, &payload).await?;
                tracing::info!(extension = name, "extension updated");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn delete(&self, user: &UserRef, name: &str) -> Result<(), GraphError> {
        self.client.delete_extension(user, name).await?;
        tracing::info!(extension = name, "extension deleted");
        Ok(())
    }
}
