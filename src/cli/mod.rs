//! CLI entry point for graphkeys.

pub mod keys;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, PartialConfig, ServeConfig};
use crate::error::Result;

/// Keep SSH public keys in a Microsoft Graph user extension.
#[derive(Parser, Debug)]
#[command(name = "graphkeys", version, about = "Manage SSH public keys stored in Microsoft Graph")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Load config from a file (JSON, or TOML when it ends in .toml)
    #[arg(long, global = true, env = "GRAPHKEYS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tenant ID
    #[arg(long, global = true, env = "GRAPHKEYS_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Client ID
    #[arg(long, global = true, env = "GRAPHKEYS_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Client secret (switches to the client credentials grant)
    #[arg(long, global = true, env = "GRAPHKEYS_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Extension name
    #[arg(long, global = true, env = "GRAPHKEYS_EXTENSION_NAME")]
    pub extension_name: Option<String>,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get SSH public keys
    Get(GetArgs),
    /// Set SSH public keys
    Set(SetArgs),
    /// Delete SSH public keys
    Delete(DeleteArgs),
    /// Start web server
    Serve(ServeArgs),
}

/// Arguments for `graphkeys get`.
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Login name (empty for the signed-in user)
    #[arg(long, default_value = "")]
    pub login: String,

    /// Output file ("-" for stdout)
    #[arg(long, default_value = "-")]
    pub out: String,
}

/// Arguments for `graphkeys set`.
#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Login name (empty for the signed-in user)
    #[arg(long, default_value = "")]
    pub login: String,

    /// Input file ("-" for stdin)
    #[arg(long = "in", default_value = "-")]
    pub input: String,
}

/// Arguments for `graphkeys delete`.
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Login name (empty for the signed-in user)
    #[arg(long, default_value = "")]
    pub login: String,
}

/// Arguments for `graphkeys serve`.
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Listen address, e.g. :8080 or 127.0.0.1:8080
    #[arg(long, env = "GRAPHKEYS_LISTEN")]
    pub listen: Option<String>,

    /// OAuth2 redirect URI registered for the client
    #[arg(long, env = "GRAPHKEYS_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Directory holding session files
    #[arg(long, env = "GRAPHKEYS_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Secret the session cookie key is derived from
    #[arg(long, env = "GRAPHKEYS_SESSION_KEY", hide_env_values = true)]
    pub session_key: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Flag and environment values as one config layer.
    pub fn flag_layer(&self) -> PartialConfig {
        let mut layer = PartialConfig {
            tenant_id: self.global.tenant_id.clone(),
            client_id: self.global.client_id.clone(),
            client_secret: self.global.client_secret.clone(),
            extension_name: self.global.extension_name.clone(),
            ..Default::default()
        };
        if let Commands::Serve(args) = &self.command {
            layer.listen = args.listen.clone();
            layer.redirect_uri = args.redirect_uri.clone();
            layer.session_dir = args.session_dir.clone();
            layer.session_key = args.session_key.clone();
        }
        layer
    }

    /// Resolve the final configuration; the config file wins over flags.
    pub fn load_config(&self) -> Result<(AppConfig, ServeConfig)> {
        let mut layer = self.flag_layer();
        if let Some(path) = &self.global.config {
            tracing::debug!(path = %path.display(), "loading config file");
            layer = layer.merge(PartialConfig::load(path)?);
        }
        Ok((layer.app_config(), layer.serve_config()))
    }
}
