use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::data::SessionData;
use super::{SessionError, SessionId};

/// Storage abstraction for session records.
pub trait SessionStore: Send + Sync {
    /// Load a session; `Ok(None)` when no record exists for `id`.
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError>;
    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), SessionError>;
}

/// One JSON file per session inside a directory.
///
/// # Example
/// ```no_run
/// use graphkeys::session::{FileSessionStore, SessionData, SessionId, SessionStore};
///
/// let store = FileSessionStore::new("/tmp/graphkeys-sessions", 16384);
/// let id = SessionId::generate();
/// store.save(&id, &SessionData::default())?;
/// # Ok::<(), graphkeys::session::SessionError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    max_length: usize,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, max_length: usize) -> Self {
        Self {
            dir: dir.into(),
            max_length,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("session_{}", id.as_str()))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError> {
        let raw = match fs::read(self.session_path(id)) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SessionError::Io(err)),
        };
        Ok(Some(SessionData::decode(&raw)?))
    }

    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), SessionError> {
        let encoded = data.encode_bounded(self.max_length)?;
        fs::create_dir_all(&self.dir)?;
        let path = self.session_path(id);
        fs::write(&path, encoded)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Process-local store, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    max_length: usize,
    records: Mutex<HashMap<SessionId, Vec<u8>>>,
}

impl MemorySessionStore {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded copy of every stored session.
    pub fn sessions(&self) -> Result<Vec<(SessionId, SessionData)>, SessionError> {
        let records = self.records.lock().map_err(|_| SessionError::Poisoned)?;
        records
            .iter()
            .map(|(id, raw)| Ok((id.clone(), SessionData::decode(raw)?)))
            .collect()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError> {
        let records = self.records.lock().map_err(|_| SessionError::Poisoned)?;
        records
            .get(id)
            .map(|raw| SessionData::decode(raw))
            .transpose()
    }

    fn save(&self, id: &SessionId, data: &SessionData) -> Result<(), SessionError> {
        let encoded = data.encode_bounded(self.max_length)?;
        self.records
            .lock()
            .map_err(|_| SessionError::Poisoned)?
            .insert(id.clone(), encoded);
        Ok(())
    }
}
