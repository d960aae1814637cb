use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multipart field the photo endpoint reads the image from
pub const PHOTO_FIELD: &str = "image";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub phone_number: String,
}

impl UpdateProfileRequest {
    /// Pre-fill the edit form from the current profile
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            email: profile.email.clone(),
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            phone_number: profile.phone_number.clone().unwrap_or_default(),
        }
    }
}

/// Avatar image held in memory so a retried upload sends the same bytes.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// MIME type for the accepted image extensions (jpeg, png, gif)
    pub fn mime_for(file_name: &str) -> Option<&'static str> {
        let ext = Path::new(file_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "gif" => Some("image/gif"),
            _ => None,
        }
    }

    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let Some(mime_type) = Self::mime_for(&file_name) else {
            bail!("Unsupported image type for {} (expected jpg, png or gif)", file_name);
        };
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Photo path has no file name")?
            .to_string();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read photo {}", path.display()))?;
        Self::new(file_name, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_profile() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "7f1c4b8e-0000-4000-8000-000000000001",
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "phone_number": "5551234567",
            "bio": "",
            "photo": "",
            "role": "user",
            "email_verified": true,
            "status": "Active",
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(profile.full_name(), "Ada Lovelace");
        assert!(profile.email_verified);
        assert!(profile.created_at.is_some());

        let form = UpdateProfileRequest::from_profile(&profile);
        assert_eq!(form.phone_number, "5551234567");
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let profile: UserProfile =
            serde_json::from_value(json!({ "id": "u1", "email": "x@example.com" })).unwrap();
        assert_eq!(profile.full_name(), "x@example.com");
    }

    #[test]
    fn test_photo_mime_types() {
        assert_eq!(PhotoUpload::mime_for("me.JPG"), Some("image/jpeg"));
        assert_eq!(PhotoUpload::mime_for("me.jpeg"), Some("image/jpeg"));
        assert_eq!(PhotoUpload::mime_for("me.png"), Some("image/png"));
        assert_eq!(PhotoUpload::mime_for("me.gif"), Some("image/gif"));
        assert_eq!(PhotoUpload::mime_for("me.pdf"), None);
        assert_eq!(PhotoUpload::mime_for("noext"), None);
        assert!(PhotoUpload::new("cv.pdf", vec![1, 2, 3]).is_err());
    }
}
