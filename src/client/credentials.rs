//! Local credential storage
//!
//! One JSON file, `credentials.json`, under the handoff config directory.

use crate::error::{Error, Result};
use crate::types::UserInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the config directory
pub const CONFIG_DIR_ENV: &str = "HANDOFF_CONFIG_DIR";

const FILE_NAME: &str = "credentials.json";

/// A token obtained by `handoff login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Server the token was issued by
    pub server: String,
    /// Bearer token
    pub token: String,
    /// Token owner, when the server told us
    pub user: Option<UserInfo>,
    /// When the login finished
    pub obtained_at: DateTime<Utc>,
}

/// Reads and writes [`Credentials`] in a directory
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$HANDOFF_CONFIG_DIR`, else `<config dir>/handoff`
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("handoff")))
            .ok_or_else(|| {
                Error::Config(format!(
                    "no config directory found; set {CONFIG_DIR_ENV}"
                ))
            })
    }

    /// Full path of the credential file
    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Stored credentials, if any
    pub fn load(&self) -> Result<Option<Credentials>> {
        match std::fs::read_to_string(self.path()) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored credentials (temp file + rename)
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(credentials)?;
        let tmp = self.dir.join(format!(".{FILE_NAME}.tmp"));
        write_private(&tmp, contents.as_bytes())?;
        std::fs::rename(&tmp, self.path())?;
        Ok(())
    }

    /// Delete the stored credentials; `false` if there were none
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)?;
    Ok(())
}
