use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::credentials::{Credential, CredentialStore, StoredCredential};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Credential store backed by a JSON session file in the cache directory.
///
/// Every call goes to disk, so a credential written by one client (or one
/// process) is visible to the next read.
pub struct FileCredentialStore {
    cache_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load session from disk
    fn load(&self) -> Result<Option<StoredCredential>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let data: StoredCredential = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;
        Ok(Some(data))
    }

    /// Save session to disk
    fn save(&self, data: &StoredCredential) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create cache directory")?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    /// Delete the session file
    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.entry().and_then(StoredCredential::live)
    }

    fn set(&self, credential: Credential, ttl: Duration) {
        let data = StoredCredential::new(&credential, ttl);
        match self.save(&data) {
            Ok(()) => debug!(expires_at = %data.expires_at, "Session saved"),
            Err(e) => warn!(error = %e, "Failed to save session"),
        }
    }

    fn remove(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear session");
        }
    }

    fn entry(&self) -> Option<StoredCredential> {
        match self.load() {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Session file unreadable, treating as signed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested"));

        assert!(store.get().is_none());
        store.set(Credential::new("token-1"), HOUR);
        assert_eq!(store.get(), Some(Credential::new("token-1")));

        // A second handle on the same directory sees the same session
        let other = FileCredentialStore::new(dir.path().join("nested"));
        assert_eq!(other.get(), Some(Credential::new("token-1")));

        other.remove();
        assert!(store.get().is_none());
        assert!(!dir.path().join("nested").join(SESSION_FILE).exists());
    }

    #[test]
    fn test_corrupt_session_file_degrades_to_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{ not json").unwrap();

        let store = FileCredentialStore::new(dir.path().to_path_buf());
        assert!(store.get().is_none());

        // Writing replaces the corrupt file
        store.set(Credential::new("token-2"), HOUR);
        assert_eq!(store.get(), Some(Credential::new("token-2")));
    }

    #[test]
    fn test_expired_session_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.set(Credential::new("old"), Duration::ZERO);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_remove_without_session_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());
        store.remove();
        assert!(store.get().is_none());
    }
}
