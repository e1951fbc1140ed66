use crate::error::{Result, SimonError};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SIMON_DIR: &str = ".simon";
pub const SESSIONS_DIR: &str = ".simon/sessions";
pub const CONFIG_FILE: &str = ".simon/config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn simon_dir(root: &Path) -> PathBuf {
    root.join(SIMON_DIR)
}

pub fn sessions_dir(root: &Path) -> PathBuf {
    root.join(SESSIONS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Path of a session file. The id must already be validated.
pub fn session_path(root: &Path, id: &str) -> PathBuf {
    sessions_dir(root).join(format!("{id}.yaml"))
}

// ---------------------------------------------------------------------------
// Session id validation
// ---------------------------------------------------------------------------

/// Session ids are lowercase hyphenated UUIDs; anything else is rejected
/// before touching the filesystem so ids can never escape the sessions
/// directory.
pub fn validate_session_id(id: &str) -> Result<()> {
    match uuid::Uuid::parse_str(id) {
        Ok(u) if u.hyphenated().to_string() == id => Ok(()),
        _ => Err(SimonError::InvalidSessionId(id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
