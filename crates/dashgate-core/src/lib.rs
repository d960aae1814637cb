//! Core library for dashgate.
//!
//! Provides the authenticated API client used by the dashboard screens:
//!
//! - `api`: `ApiClient`, the request interceptor, and the refresh coordinator
//!   that turns expired sessions into a single refresh-and-retry
//! - `auth`: credential stores (memory, session file, OS keychain) and the
//!   persistent cookie jar carrying the refresh cookie
//! - `navigation`: the navigation and notification ports the client drives
//! - `models`: wire types for the account API
//! - `config`: persisted configuration and client settings

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse};
pub use auth::{Credential, CredentialStore};
pub use config::{ClientSettings, Config};
pub use navigation::{Navigator, Notice, NoticeLevel, Notifier};
