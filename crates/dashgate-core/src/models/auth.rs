use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Second-factor code, as typed by the user
#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest {
    pub otp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Password-reset code together with the account it was sent to
#[derive(Debug, Clone, Serialize)]
pub struct OtpVerifyRequest {
    pub otp: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

/// Account summary returned by registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredAccount {
    pub id: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reset_password_wire_names() {
        let body = serde_json::to_value(ResetPasswordRequest {
            password: "N3w-pass".into(),
            password_confirm: "N3w-pass".into(),
        })
        .unwrap();
        assert_eq!(body, json!({ "password": "N3w-pass", "passwordConfirm": "N3w-pass" }));
    }

    #[test]
    fn test_register_wire_names() {
        let body = serde_json::to_value(RegisterRequest {
            email: "ada@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        })
        .unwrap();
        assert_eq!(body["confirm_password"], "pw");
        assert_eq!(body["first_name"], "Ada");
    }
}
