//! Persistence of the signed-in session between process runs.

use crate::error::SessionStoreError;
use crate::types::RemoteSession;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub type StoreResult<T> = Result<T, SessionStoreError>;

/// Backend holding at most one persisted session.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any.
    fn load(&self) -> StoreResult<Option<RemoteSession>>;

    /// Replace the stored session.
    fn save(&self, session: &RemoteSession) -> StoreResult<()>;

    /// Remove the stored session. Returns true if one existed.
    fn clear(&self) -> StoreResult<bool>;
}

/// Session kept only for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<RemoteSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: RemoteSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RemoteSession>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> StoreResult<Option<RemoteSession>> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &RemoteSession) -> StoreResult<()> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> StoreResult<bool> {
        Ok(self.slot().take().is_some())
    }
}

/// Session stored as a JSON file, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_write(path: &Path) -> std::io::Result<std::fs::File> {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(path)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> StoreResult<Option<RemoteSession>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "discarding unreadable persisted session"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &RemoteSession) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated session file.
        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = Self::open_for_write(&tmp_path)?;
        file.write_all(serde_json::to_string_pretty(session)?.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> StoreResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
