use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound applied when a TTL does not fit a chrono duration.
const MAX_TTL_DAYS: i64 = 3650;

/// Short-lived bearer token issued by the API.
///
/// Never parsed or inspected; the only way to read it is `expose()`,
/// which the request interceptor uses to build the Authorization header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Persisted form of a credential together with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn new(credential: &Credential, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS));
        Self {
            token: credential.expose().to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }

    /// The credential if it has not expired yet
    pub fn live(self) -> Option<Credential> {
        if self.is_expired() {
            None
        } else {
            Some(Credential(self.token))
        }
    }
}

/// Storage for the single live session credential.
///
/// Writes are visible to the next `get()` immediately. None of the methods
/// can fail: a backend error is logged and reads as "no credential".
pub trait CredentialStore: Send + Sync {
    /// The current credential, or `None` when absent or expired
    fn get(&self) -> Option<Credential>;

    /// Replace the current credential
    fn set(&self, credential: Credential, ttl: Duration);

    /// Drop the current credential
    fn remove(&self);

    /// Raw entry including expiry, for status displays
    fn entry(&self) -> Option<StoredCredential> {
        None
    }
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<StoredCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a credential
    pub fn with_credential(credential: Credential, ttl: Duration) -> Self {
        let store = Self::new();
        store.set(credential, ttl);
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.clone().and_then(StoredCredential::live)
    }

    fn set(&self, credential: Credential, ttl: Duration) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(StoredCredential::new(&credential, ttl));
    }

    fn remove(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    fn entry(&self) -> Option<StoredCredential> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_set_then_get_is_immediate() {
        let store = MemoryCredentialStore::new();
        assert!(store.get().is_none());

        store.set(Credential::new("abc"), HOUR);
        assert_eq!(store.get(), Some(Credential::new("abc")));

        store.set(Credential::new("def"), HOUR);
        assert_eq!(store.get(), Some(Credential::new("def")));
    }

    #[test]
    fn test_remove_clears_credential() {
        let store = MemoryCredentialStore::with_credential(Credential::new("abc"), HOUR);
        store.remove();
        assert!(store.get().is_none());
        assert!(store.entry().is_none());
    }

    #[test]
    fn test_expired_credential_reads_as_absent() {
        let store = MemoryCredentialStore::with_credential(Credential::new("abc"), Duration::ZERO);
        assert!(store.get().is_none());
        // The raw entry is still there for status displays
        assert!(store.entry().is_some_and(|e| e.is_expired()));
    }

    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_minutes_until_expiry() {
        let stored = StoredCredential::new(&Credential::new("abc"), HOUR);
        let minutes = stored.minutes_until_expiry();
        assert!((59..=60).contains(&minutes));
    }
}
