//! CLI handler for the web server.

use crate::config::{AppConfig, ServeConfig};
use crate::error::Result;

/// Handle `graphkeys serve`.
pub async fn handle_serve(app: &AppConfig, config: &ServeConfig) -> Result<()> {
    if app.client_secret.is_none() {
        tracing::warn!("no client secret configured; the code exchange will only work for public clients");
    }
    crate::web::serve(app, config).await
}
