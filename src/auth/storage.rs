//! Credential Storage
//!
//! Holds the single bearer credential for a page origin. The file-backed
//! store persists it across restarts; the memory store is for tests and
//! short-lived sessions.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Opaque bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw bearer string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw bearer string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Single-slot credential storage.
///
/// Unavailable storage reads as absent; write failures are logged and
/// otherwise ignored. Last write wins.
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any
    fn get(&self) -> Option<Credential>;

    /// Replace the stored credential
    fn set(&self, credential: &Credential);

    /// Remove the stored credential
    fn clear(&self);
}

/// In-memory credential slot
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a credential
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.slot.read().clone()
    }

    fn set(&self, credential: &Credential) {
        *self.slot.write() = Some(credential.clone());
    }

    fn clear(&self) {
        *self.slot.write() = None;
    }
}

/// On-disk representation
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    /// Unix timestamp of the last write
    #[serde(default)]
    saved_at: u64,
}

/// File-backed credential store scoped to one page origin
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store for `origin` under `base_dir`, using `key` as the slot name
    pub fn new(base_dir: &Path, origin: &str, key: &str) -> Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(base_dir).map_err(|e| {
                Error::Storage(format!("Failed to create credential storage dir: {e}"))
            })?;
        }

        Ok(Self {
            path: base_dir.join(format!("{}_{key}.json", storage_key(origin, key))),
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, credential: &Credential) -> Result<()> {
        let stored = StoredCredential {
            token: credential.as_str().to_string(),
            saved_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        let content = serde_json::to_string_pretty(&stored)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;

        // mode() only applies on creation; tighten files left by older writes
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                warn!(path = %self.path.display(), error = %e, "Failed to restrict credential file permissions");
            }
        }

        file.write_all(content.as_bytes())?;

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        if !self.path.exists() {
            return None;
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<StoredCredential>(&content) {
                Ok(stored) if !stored.token.is_empty() => Some(Credential::new(stored.token)),
                Ok(_) => None,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to parse stored credential");
                    None
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read credential file");
                None
            }
        }
    }

    fn set(&self, credential: &Credential) {
        match self.write(credential) {
            Ok(()) => info!(path = %self.path.display(), "Saved credential"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to save credential"),
        }
    }

    fn clear(&self) {
        if !self.path.exists() {
            debug!("No stored credential to clear");
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Cleared credential"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to clear credential"),
        }
    }
}

/// Stable file stem for an origin/key pair
fn storage_key(origin: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    format!("{hash:x}")[..16].to_string()
}
