//! OAuth2 grants, token handling and token sources.

pub mod authenticator;
pub mod device_code;
pub mod error;
pub mod provider;
pub mod source;
pub mod token;

pub use authenticator::Authenticator;
pub use device_code::{DeviceCodePoll, DeviceCodeSession};
pub use error::AuthError;
pub use provider::{OAuthClient, OAuthEndpoints};
pub use source::{ClientCredentialsTokenSource, RefreshingTokenSource, TokenSource};
pub use token::Token;
