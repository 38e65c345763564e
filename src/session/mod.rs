//! Cookie-keyed session records used by the browser sign-in flow.

pub mod data;
pub mod store;

pub use data::SessionData;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Session is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("Session store lock poisoned")]
    Poisoned,
}

/// Opaque session identifier carried in the session cookie.
///
/// Only UUIDs are accepted, so an identifier is always safe to use as part
/// of a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw)
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loaded session bound to the store it came from.
pub struct Session {
    id: SessionId,
    data: SessionData,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Load the session for `id`, or start an empty one.
    ///
    /// An unreadable record starts a fresh session under the same id; a
    /// missing or malformed id gets a newly generated one.
    pub fn open(store: Arc<dyn SessionStore>, id: Option<SessionId>) -> Self {
        let Some(id) = id else {
            return Self::fresh(store, SessionId::generate());
        };
        match store.load(&id) {
            Ok(Some(data)) => Self { id, data, store },
            Ok(None) => Self::fresh(store, id),
            Err(err) => {
                tracing::warn!(session_id = %id, error = %err, "discarding unreadable session");
                Self::fresh(store, id)
            }
        }
    }

    fn fresh(store: Arc<dyn SessionStore>, id: SessionId) -> Self {
        Self {
            id,
            data: SessionData::default(),
            store,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    pub fn save(&self) -> Result<(), SessionError> {
        self.store.save(&self.id, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_rejects_path_like_values() {
        assert!(SessionId::parse("../../etc/passwd").is_none());
        assert!(SessionId::parse("").is_none());
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn open_without_id_starts_fresh() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(16384));
        let session = Session::open(store, None);
        assert_eq!(session.data(), &SessionData::default());
    }

    #[test]
    fn saved_values_are_visible_to_next_open() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(16384));
        let mut session = Session::open(store.clone(), None);
        session.data_mut().redirect = Some("/next".to_string());
        session.save().unwrap();

        let reopened = Session::open(store, Some(session.id().clone()));
        assert_eq!(reopened.data().redirect.as_deref(), Some("/next"));
    }

    #[test]
    fn unknown_id_is_kept_for_fresh_session() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(16384));
        let id = SessionId::generate();
        let session = Session::open(store, Some(id.clone()));
        assert_eq!(session.id(), &id);
        assert!(session.data().token.is_none());
    }
}
