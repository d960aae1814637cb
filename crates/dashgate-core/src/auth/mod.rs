//! Authentication module for managing the session credential.
//!
//! This module provides:
//! - `Credential`: the opaque bearer token handed out by the API
//! - `CredentialStore`: the storage seam the client reads and writes through
//! - `MemoryCredentialStore`, `FileCredentialStore`, `KeyringCredentialStore`:
//!   in-process, session-file, and OS-keychain backends
//! - `PersistentCookieJar`: replays the server-managed refresh cookie
//!
//! Access credentials expire after a configurable TTL (one hour by default).

pub mod cookies;
pub mod credentials;
pub mod keychain;
pub mod session;

pub use cookies::PersistentCookieJar;
pub use credentials::{Credential, CredentialStore, MemoryCredentialStore, StoredCredential};
pub use keychain::KeyringCredentialStore;
pub use session::FileCredentialStore;
