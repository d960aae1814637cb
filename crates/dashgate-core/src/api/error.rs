use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 401 that survived a refresh and retry
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The refresh call failed; the local session has been cleared
    #[error("Session has expired - please sign in again")]
    SessionExpired,

    /// 301/302 policy redirect; navigation to `location` has been scheduled
    #[error("Redirected to {location}")]
    Redirect { status: u16, location: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    #[error("Server error: {message}")]
    ServerError {
        message: String,
        detail: Option<String>,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Backend detail string for an expired challenge token
const TOKEN_EXPIRED_DETAIL: &str = "token is expired";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)",
                    &body[..end],
                    body.len())
        }
    }

    /// Build the error for a non-success status, keeping the server's message.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let detail = parsed.error;
        let message = parsed
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                let truncated = Self::truncate_body(body);
                if truncated.is_empty() {
                    status.to_string()
                } else {
                    truncated
                }
            });

        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError { message, detail },
            code => ApiError::Rejected {
                status: code,
                message,
                detail,
            },
        }
    }

    /// HTTP status behind this error, when there was a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Redirect { status, .. } => Some(*status),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the server reported an expired challenge token
    pub fn is_token_expired(&self) -> bool {
        match self {
            ApiError::Rejected { detail, .. } | ApiError::ServerError { detail, .. } => detail
                .as_deref()
                .is_some_and(|d| d.contains(TOKEN_EXPIRED_DETAIL)),
            _ => false,
        }
    }

    /// Transport failure with no response at all
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}
