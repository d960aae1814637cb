//! Authenticated API client for the account service.
//!
//! Every outbound call passes through the request interceptor, which attaches
//! the current bearer credential, and every response through the refresh
//! coordinator, which turns an expired session into one refresh and one retry
//! and turns 301/302 policy redirects into forced navigation.
//!
//! The refresh credential itself is an http-only cookie the client never reads.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod request;

pub use client::{ApiClient, ApiResponse};
pub use coordinator::{Disposition, RedirectTarget, RefreshCoordinator, RefreshFailure};
pub use error::ApiError;
pub use request::{ApiRequest, FilePart, RequestBody, RequestContext};
