use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::auth::Credential;

use super::ApiError;

/// One refresh-and-retry cycle per logical request.
pub const MAX_AUTH_RETRIES: u32 = 1;

/// A logical API call. Owned and cloneable so the retried attempt sends
/// exactly what the first attempt sent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FilePart>),
}

#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FilePart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

impl RequestBody {
    /// Attach the body to a request builder. Multipart forms are rebuilt from
    /// the stored bytes on every attempt.
    pub fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self {
            RequestBody::Empty => Ok(builder),
            RequestBody::Json(value) => Ok(builder.json(value)),
            RequestBody::Multipart(parts) => {
                let mut form = Form::new();
                for part in parts {
                    let file = Part::bytes(part.bytes.clone())
                        .file_name(part.file_name.clone())
                        .mime_str(&part.mime_type)?;
                    form = form.part(part.field.clone(), file);
                }
                Ok(builder.multipart(form))
            }
        }
    }
}

/// Per-attempt state of one logical request.
///
/// Never mutated: the retry gets a fresh context from `retry_with`, carrying
/// the credential minted by this request's own refresh.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    attempt: u32,
    credential: Option<Credential>,
}

impl RequestContext {
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The retry-attempted marker: false on the first attempt, true on the retry
    pub fn retry_attempted(&self) -> bool {
        self.attempt > 0
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < MAX_AUTH_RETRIES
    }

    pub fn retry_with(&self, credential: Credential) -> Self {
        Self {
            attempt: self.attempt + 1,
            credential: Some(credential),
        }
    }

    /// Credential this attempt must use instead of reading the store
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_marker_moves_once() {
        let first = RequestContext::initial();
        assert!(!first.retry_attempted());
        assert!(first.can_retry());
        assert!(first.credential().is_none());

        let retry = first.retry_with(Credential::new("fresh"));
        assert!(retry.retry_attempted());
        assert!(!retry.can_retry());
        assert_eq!(retry.credential(), Some(&Credential::new("fresh")));

        // The original context is untouched
        assert!(!first.retry_attempted());
    }

    #[test]
    fn test_json_body() {
        let req = ApiRequest::post("/api/v1/auth/login")
            .json(&json!({ "email": "a@b.c" }))
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert!(matches!(req.body, RequestBody::Json(ref v) if v["email"] == "a@b.c"));
    }

    #[test]
    fn test_apply_builds_request() {
        let client = reqwest::Client::new();
        let body = RequestBody::Json(json!({ "otp": "123456" }));
        let request = body
            .apply(client.post("http://localhost:8000/x"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let parts = vec![FilePart {
            field: "image".into(),
            file_name: "me.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }];
        let request = RequestBody::Multipart(parts)
            .apply(client.put("http://localhost:8000/api/v1/user/photo"))
            .unwrap()
            .build()
            .unwrap();
        let content_type = request.headers().get(reqwest::header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("multipart/form-data"));
    }
}
