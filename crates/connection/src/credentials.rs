//! Session credential storage.
//!
//! The connection client never reads credentials itself; the host looks the
//! token up here and builds an [`Endpoint`](crate::Endpoint) from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

/// Errors from credential persistence.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of session credentials, keyed by account.
pub trait CredentialStore: Send + Sync {
    fn token(&self, account: &str) -> Option<String>;
}

/// Credentials cached in memory and persisted as a JSON map.
///
/// The file is written with owner-only permissions on Unix.
pub struct FileCredentialStore {
    path: PathBuf,
    tokens: RwLock<BTreeMap<String, String>>,
}

impl FileCredentialStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn new(path: PathBuf) -> Result<Self, CredentialError> {
        let tokens = load(&path)?;
        Ok(Self {
            path,
            tokens: RwLock::new(tokens),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_token(&self, account: &str, token: &str) -> Result<(), CredentialError> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account.to_owned(), token.to_owned());
        self.persist()
    }

    pub fn remove_token(&self, account: &str) -> Result<(), CredentialError> {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account);
        self.persist()
    }

    /// Accounts with a stored token, sorted.
    pub fn accounts(&self) -> Vec<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn persist(&self) -> Result<(), CredentialError> {
        let map = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        let json = serde_json::to_string_pretty(&*map)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        restrict_permissions(&self.path)?;
        debug!(count = map.len(), path = %self.path.display(), "persisted credentials");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self, account: &str) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned()
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, String>, CredentialError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    let tokens: BTreeMap<String, String> = serde_json::from_str(&data)?;
    debug!(count = tokens.len(), path = %path.display(), "loaded credentials");
    Ok(tokens)
}

fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Default store location: `<config dir>/companion/credentials.json`.
pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("companion").join("credentials.json"))
}

/// Platform config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}
