use std::path::PathBuf;

use tracing::warn;

use crate::models::UserSession;

use super::StorageError;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Durable store for the device's single session record.
///
/// `load` never contacts the network; deciding what to do when the record
/// is absent (register a new session) belongs to the sync engine, not here.
#[derive(Clone)]
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Load the persisted session, or `None` when absent.
    ///
    /// A read or decode failure is logged and treated as absence so the
    /// caller can fall back to the bootstrap-new-session path instead of
    /// crashing on a corrupt file.
    pub fn load(&self) -> Option<UserSession> {
        match super::read_json(&self.path()) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "session read failed, treating as absent");
                None
            }
        }
    }

    /// Persist the session, replacing the whole record. Last writer wins.
    pub fn save(&self, session: &UserSession) -> Result<(), StorageError> {
        super::write_json(&self.path(), session)
    }

    /// Remove the persisted session. Idempotent.
    pub fn clear(&self) -> Result<(), StorageError> {
        super::remove_if_exists(&self.path())
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}
