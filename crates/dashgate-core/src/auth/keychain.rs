use std::time::Duration;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::credentials::{Credential, CredentialStore, StoredCredential};

const SERVICE_NAME: &str = "dashgate";

/// Credential store in the OS keychain.
///
/// The keychain entry holds the JSON-encoded `StoredCredential`, so the
/// expiry survives alongside the token.
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry_handle(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.account).context("Failed to create keyring entry")
    }

    fn load(&self) -> Result<Option<StoredCredential>> {
        let entry = self.entry_handle()?;
        match entry.get_password() {
            Ok(secret) => {
                let data = serde_json::from_str(&secret)
                    .context("Failed to parse keychain credential")?;
                Ok(Some(data))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn store(&self, data: &StoredCredential) -> Result<()> {
        let secret = serde_json::to_string(data)?;
        self.entry_handle()?
            .set_password(&secret)
            .context("Failed to store credential in keychain")?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match self.entry_handle()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.entry().and_then(StoredCredential::live)
    }

    fn set(&self, credential: Credential, ttl: Duration) {
        if let Err(e) = self.store(&StoredCredential::new(&credential, ttl)) {
            warn!(error = %e, "Failed to save credential to keychain");
        }
    }

    fn remove(&self) {
        if let Err(e) = self.delete() {
            warn!(error = %e, "Failed to remove credential from keychain");
        }
    }

    fn entry(&self) -> Option<StoredCredential> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable, treating as signed out");
            None
        })
    }
}
