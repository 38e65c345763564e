//! graphkeys: SSH public keys in a Microsoft Graph user extension.
//!
//! The command line reads, writes and deletes one string-valued open
//! extension on a directory user, authenticating with the device-code or
//! client-credentials grant. The `serve` command runs a small browser
//! sign-in flow (authorization-code grant) backed by cookie-keyed sessions.
//!
//! # Quick Start
//!
//! ```no_run
//! use graphkeys::auth::Authenticator;
//! use graphkeys::config::AppConfig;
//! use graphkeys::graph::AttributeStore;
//!
//! # async fn example() -> graphkeys::error::Result<()> {
//! let config = AppConfig::default();
//! let tokens = Authenticator::new(&config)?
//!     .authenticate(|session| eprintln!("{}", session.prompt()))
//!     .await?;
//! let store = AttributeStore::from_config(&config, tokens)?;
//! let me = store.resolve("");
//! if let Some(keys) = store.get(&me, &config.extension_name).await? {
//!     print!("{keys}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod session;
pub mod web;

#[cfg(feature = "cli")]
pub mod cli;
