use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success envelope: `{ success, message, data }`.
///
/// `data` is either `{ "data": T }` or a bare `T`; the backend's JSON helper
/// emits the bare form and names the flag `status`, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default, alias = "status")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<EnvelopeData<T>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeData<T> {
    Nested { data: T },
    Bare(T),
}

impl<T> EnvelopeData<T> {
    pub fn into_inner(self) -> T {
        match self {
            EnvelopeData::Nested { data } => data,
            EnvelopeData::Bare(data) => data,
        }
    }
}

impl<T> ApiEnvelope<T> {
    /// The payload, if the response carried one
    pub fn into_data(self) -> Option<T> {
        self.data.map(EnvelopeData::into_inner)
    }
}

/// Error envelope: `{ message, error, status }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

const TOKEN_KEYS: [&str; 2] = ["access_token", "accessToken"];

/// Find the access credential in a token-issuing response.
///
/// Looks for `access_token` (or `accessToken`) at the root, under `data`,
/// and under `data.data`.
pub fn extract_access_token(body: &Value) -> Option<String> {
    let candidates = [Some(body), body.get("data"), body.pointer("/data/data")];
    candidates.into_iter().flatten().find_map(|obj| {
        TOKEN_KEYS.iter().find_map(|key| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    })
}
