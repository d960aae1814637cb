//! Wire types for the account API.
//!
//! - `ApiEnvelope`, `ErrorBody`: the JSON envelopes wrapping every response
//! - Auth request bodies: `LoginRequest`, `RegisterRequest`, OTP and password reset inputs
//! - `UserProfile`, `UpdateProfileRequest`, `PhotoUpload`: the settings screens' data

pub mod auth;
pub mod envelope;
pub mod user;

pub use auth::{
    EmailRequest, LoginRequest, OtpRequest, OtpVerifyRequest, RegisterRequest,
    RegisteredAccount, ResetPasswordRequest,
};
pub use envelope::{extract_access_token, ApiEnvelope, EnvelopeData, ErrorBody};
pub use user::{PhotoUpload, UpdateProfileRequest, UserProfile};
