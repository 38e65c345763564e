//! Configuration (layered: defaults < env < flags < config file).
//!
//! Every layer is a [`PartialConfig`]; later layers win field by field. The
//! merged result is resolved once into the immutable [`AppConfig`] and
//! [`ServeConfig`] values handed to the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Deserialize;

use crate::error::KeysError;

pub const DEFAULT_TENANT_ID: &str = "common";
pub const DEFAULT_CLIENT_ID: &str = "45c7f99c-0a94-42ff-a6d8-a8d657229e8c";
pub const DEFAULT_EXTENSION_NAME: &str = "dev.l0w.ssh_public_keys";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LISTEN: &str = ":8080";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/auth/callback";
pub const DEFAULT_SESSION_MAX_LENGTH: usize = 16384;

/// Settings shared by every subcommand.
///
/// # Example
/// ```
/// use graphkeys::config::AppConfig;
///
/// let config = AppConfig::builder()
///     .tenant_id("contoso.onmicrosoft.com".to_string())
///     .client_id("app-id".to_string())
///     .build();
/// assert_eq!(config.extension_name, "dev.l0w.ssh_public_keys");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct AppConfig {
    #[builder(default = DEFAULT_TENANT_ID.to_string())]
    pub tenant_id: String,
    #[builder(default = DEFAULT_CLIENT_ID.to_string())]
    pub client_id: String,
    pub client_secret: Option<String>,
    #[builder(default = DEFAULT_EXTENSION_NAME.to_string())]
    pub extension_name: String,
    #[builder(default)]
    pub login_map: HashMap<String, String>,
    #[builder(default = DEFAULT_AUTHORITY_URL.to_string())]
    pub authority_url: String,
    #[builder(default = DEFAULT_GRAPH_URL.to_string())]
    pub graph_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Settings only the `serve` subcommand needs.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub listen: String,
    pub redirect_uri: String,
    pub session_dir: PathBuf,
    pub session_key: Option<String>,
    pub session_max_length: usize,
}

impl ServeConfig {
    /// Socket address for the listener; a bare `:port` binds every interface.
    pub fn bind_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        PartialConfig::default().serve_config()
    }
}

/// One configuration layer. Absent fields defer to earlier layers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub extension_name: Option<String>,
    pub login_map: Option<HashMap<String, String>>,
    pub authority_url: Option<String>,
    pub graph_url: Option<String>,
    pub listen: Option<String>,
    pub redirect_uri: Option<String>,
    pub session_dir: Option<PathBuf>,
    pub session_key: Option<String>,
}

impl PartialConfig {
    /// Read a config file: TOML when the extension is `.toml`, JSON otherwise.
    pub fn load(path: &Path) -> Result<Self, KeysError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            KeysError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&raw)
        } else {
            Self::from_json(&raw)
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, KeysError> {
        serde_json::from_str(raw)
            .map_err(|err| KeysError::Configuration(format!("invalid JSON config: {err}")))
    }

    pub fn from_toml(raw: &str) -> Result<Self, KeysError> {
        toml::from_str(raw)
            .map_err(|err| KeysError::Configuration(format!("invalid TOML config: {err}")))
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: PartialConfig) -> PartialConfig {
        PartialConfig {
            tenant_id: other.tenant_id.or(self.tenant_id),
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
            extension_name: other.extension_name.or(self.extension_name),
            login_map: other.login_map.or(self.login_map),
            authority_url: other.authority_url.or(self.authority_url),
            graph_url: other.graph_url.or(self.graph_url),
            listen: other.listen.or(self.listen),
            redirect_uri: other.redirect_uri.or(self.redirect_uri),
            session_dir: other.session_dir.or(self.session_dir),
            session_key: other.session_key.or(self.session_key),
        }
    }

    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            tenant_id: non_empty(&self.tenant_id).unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
            client_id: non_empty(&self.client_id).unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            client_secret: non_empty(&self.client_secret),
            extension_name: non_empty(&self.extension_name)
                .unwrap_or_else(|| DEFAULT_EXTENSION_NAME.to_string()),
            login_map: self.login_map.clone().unwrap_or_default(),
            authority_url: non_empty(&self.authority_url)
                .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string()),
            graph_url: non_empty(&self.graph_url).unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string()),
        }
    }

    pub fn serve_config(&self) -> ServeConfig {
        ServeConfig {
            listen: non_empty(&self.listen).unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            redirect_uri: non_empty(&self.redirect_uri)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            session_dir: self
                .session_dir
                .clone()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(default_session_dir),
            session_key: non_empty(&self.session_key),
            session_max_length: DEFAULT_SESSION_MAX_LENGTH,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn default_session_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "l0w", "graphkeys")
        .map(|dirs| dirs.cache_dir().join("sessions"))
        .unwrap_or_else(|| std::env::temp_dir().join("graphkeys-sessions"))
}
