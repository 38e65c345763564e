//! Microsoft Graph user extensions.

pub mod client;
pub mod error;
pub mod store;

pub use client::{Extension, ExtensionPayload, GraphClient, User, UserRef};
pub use error::GraphError;
pub use store::AttributeStore;
