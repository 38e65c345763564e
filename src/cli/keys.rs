//! CLI handlers for get, set, and delete.

use std::io::{Read, Write};

use crate::auth::{Authenticator, DeviceCodeSession};
use crate::config::AppConfig;
use crate::error::Result;
use crate::graph::AttributeStore;

use super::{DeleteArgs, GetArgs, SetArgs};

async fn connect(config: &AppConfig) -> Result<AttributeStore> {
    let authenticator = Authenticator::new(config)?;
    let tokens = authenticator.authenticate(print_prompt).await?;
    Ok(AttributeStore::from_config(config, tokens)?)
}

// stdout may carry the key itself.
fn print_prompt(session: &DeviceCodeSession) {
    eprintln!("{}", session.prompt());
}

/// Handle `graphkeys get`.
pub async fn handle_get(config: &AppConfig, args: &GetArgs) -> Result<()> {
    let store = connect(config).await?;
    let user = store.resolve(&args.login);
    let Some(value) = store.get(&user, &config.extension_name).await? else {
        tracing::info!(extension = %config.extension_name, "no extension found");
        return Ok(());
    };
    write_output(&args.out, value.as_bytes())
}

/// Handle `graphkeys set`.
pub async fn handle_set(config: &AppConfig, args: &SetArgs) -> Result<()> {
    let value = read_input(&args.input)?;
    let store = connect(config).await?;
    let user = store.resolve(&args.login);
    store.set(&user, &config.extension_name, &value).await?;
    Ok(())
}

/// Handle `graphkeys delete`.
pub async fn handle_delete(config: &AppConfig, args: &DeleteArgs) -> Result<()> {
    let store = connect(config).await?;
    let user = store.resolve(&args.login);
    store.delete(&user, &config.extension_name).await?;
    Ok(())
}

/// Write to stdout for `-`, otherwise to the named file.
pub fn write_output(target: &str, bytes: &[u8]) -> Result<()> {
    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()?;
    } else {
        std::fs::write(target, bytes)?;
    }
    Ok(())
}

/// Read stdin for `-`, otherwise the named file.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}
