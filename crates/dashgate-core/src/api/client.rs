//! API client for the account service.
//!
//! `ApiClient` sends every request through the interceptor and the refresh
//! coordinator, and wraps the endpoints the dashboard screens call.

use std::sync::Arc;

use reqwest::{redirect, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore, PersistentCookieJar};
use crate::config::ClientSettings;
use crate::models::{
    extract_access_token, ApiEnvelope, EmailRequest, LoginRequest, OtpRequest, OtpVerifyRequest,
    PhotoUpload, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest, UserProfile,
};
use crate::models::user::PHOTO_FIELD;
use crate::navigation::{NavigationScheduler, Navigator, Notifier};

use super::coordinator::{self, Disposition, RefreshCoordinator};
use super::interceptor;
use super::request::{ApiRequest, FilePart, RequestContext};
use super::ApiError;

// ============================================================================
// Endpoints
// ============================================================================

const LOGIN_PATH: &str = "/api/v1/auth/login";
const REGISTER_PATH: &str = "/api/v1/auth/register";
const TWO_FACTOR_VERIFY_PATH: &str = "/api/v1/auth/2fa/verify";
const TWO_FACTOR_RESEND_PATH: &str = "/api/v1/auth/2fa";
const FORGOT_PASSWORD_PATH: &str = "/api/v1/auth/forgot-password";
const FORGOT_PASSWORD_VERIFY_PATH: &str = "/api/v1/auth/forgot-password/verify";
const RESET_PASSWORD_CONFIRM_PATH: &str = "/api/v1/auth/reset-password/confirm";
const LOGOUT_PATH: &str = "/api/v1/auth/logout";
const PROFILE_PATH: &str = "/api/v1/user/profile";
const PHOTO_PATH: &str = "/api/v1/user/photo";

/// Percent-encode a value used as a single path segment
fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Successful (2xx) response with its body read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    /// Read the body; non-success statuses become the matching `ApiError`.
    async fn from_response(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(Self { status, body })
        } else {
            Err(ApiError::from_status(status, &body))
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    pub fn envelope<T: DeserializeOwned>(&self) -> Result<ApiEnvelope<T>, ApiError> {
        self.json()
    }

    /// The envelope's payload; missing data is an invalid response
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        self.envelope::<T>()?
            .into_data()
            .ok_or_else(|| ApiError::InvalidResponse("Response carried no data".into()))
    }

    /// The envelope's message, empty if the body has none
    pub fn message(&self) -> String {
        self.envelope::<serde_json::Value>()
            .map(|e| e.message)
            .unwrap_or_default()
    }
}

/// Authenticated client.
/// Clone is cheap - the connection pool, credential store and refresh state
/// are all shared behind `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    settings: Arc<ClientSettings>,
    credentials: Arc<dyn CredentialStore>,
    navigation: Arc<NavigationScheduler>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client whose refresh cookie lives only in memory
    pub fn new(
        settings: ClientSettings,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        Self::with_cookie_jar(
            settings,
            credentials,
            navigator,
            notifier,
            Arc::new(PersistentCookieJar::in_memory()),
        )
    }

    /// Create a client that replays cookies from the given jar
    pub fn with_cookie_jar(
        settings: ClientSettings,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        cookies: Arc<PersistentCookieJar>,
    ) -> Result<Self, ApiError> {
        // Redirects must reach the coordinator instead of being followed
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .cookie_provider(cookies)
            .redirect(redirect::Policy::none())
            .build()?;

        let navigation = Arc::new(NavigationScheduler::new(navigator));
        let coordinator = RefreshCoordinator::new(
            http.clone(),
            &settings,
            Arc::clone(&credentials),
            Arc::clone(&navigation),
            notifier,
        );

        Ok(Self {
            http,
            settings: Arc::new(settings),
            credentials,
            navigation,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Check if a live credential is held
    pub fn is_authenticated(&self) -> bool {
        self.credentials.get().is_some()
    }

    /// Number of refresh calls this client has issued
    pub fn refresh_count(&self) -> u64 {
        self.coordinator.refresh_count()
    }

    /// Wait for every scheduled navigation to run
    pub async fn flush_navigation(&self) {
        self.navigation.flush().await;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Send a request, refreshing an expired session at most once.
    ///
    /// Resolves exactly once: with the first attempt's outcome, with the
    /// retry's outcome after a successful refresh, or with the refresh or
    /// redirect failure.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut context = RequestContext::initial();

        loop {
            let credential = interceptor::credential_for(&context, self.credentials.as_ref());
            let builder = self
                .http
                .request(request.method.clone(), self.url(&request.path));
            let builder = interceptor::authorize(request.body.apply(builder)?, credential.as_ref());

            debug!(
                method = %request.method,
                path = %request.path,
                attempt = context.attempt(),
                retry = context.retry_attempted(),
                authenticated = credential.is_some(),
                "Sending request"
            );
            let response = builder.send().await?;
            let status = response.status();

            match coordinator::classify(status, &context) {
                Disposition::PassThrough => return ApiResponse::from_response(response).await,
                Disposition::Redirect => {
                    let headers = response.headers().clone();
                    let body = response.text().await?;
                    let location = coordinator::redirect_target(&headers, &body).ok_or_else(|| {
                        ApiError::InvalidResponse(format!("{} redirect without a target", status))
                    })?;
                    self.coordinator.handle_redirect(&location);
                    return Err(ApiError::Redirect {
                        status: status.as_u16(),
                        location,
                    });
                }
                Disposition::Refresh => match self.coordinator.refresh(credential.as_ref()).await {
                    Ok(fresh) => {
                        debug!(path = %request.path, "Retrying with refreshed credential");
                        context = context.retry_with(fresh);
                    }
                    Err(failure) => {
                        debug!(path = %request.path, reason = %failure, "Giving up after failed refresh");
                        return Err(ApiError::SessionExpired);
                    }
                },
                Disposition::Exhausted => {
                    warn!(path = %request.path, "Still unauthorized after session refresh");
                    let body = response.text().await?;
                    return Err(ApiError::from_status(status, &body));
                }
            }
        }
    }

    /// `send`, abandoned as soon as `cancel` fires. A cancelled request skips
    /// any refresh or retry it had not finished; a refresh shared with other
    /// requests keeps running for them.
    pub async fn send_cancellable(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(path = %request.path, "Request cancelled");
                Err(ApiError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }

    /// Clear the local session, tell the server, and go to sign-in.
    ///
    /// The credential is removed before anything else so no later request can
    /// pick it up. The server call is best effort; returns whether it
    /// acknowledged the logout.
    pub async fn logout(&self) -> bool {
        self.credentials.remove();
        info!("Local session cleared");

        let acknowledged = match self
            .http
            .post(self.url(LOGOUT_PATH))
            .json(&json!({}))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Server rejected logout");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to notify server of logout");
                false
            }
        };

        self.navigation.navigate_now(&self.settings.sign_in_path);
        acknowledged
    }

    // ===== Auth Endpoints =====

    /// Submit email and password. The server answers with a redirect to the
    /// second-factor screen, surfaced as `ApiError::Redirect`.
    pub async fn login(&self, input: &LoginRequest) -> Result<String, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(input)?;
        Ok(self.send(&request).await?.message())
    }

    pub async fn register(&self, input: &RegisterRequest) -> Result<String, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH).json(input)?;
        Ok(self.send(&request).await?.message())
    }

    /// Complete second-factor sign-in and store the issued credential
    pub async fn verify_two_factor(&self, token: &str, otp: &str) -> Result<String, ApiError> {
        let path = format!("{}/{}", TWO_FACTOR_VERIFY_PATH, segment(token));
        let request = ApiRequest::post(path).json(&OtpRequest {
            otp: otp.to_string(),
        })?;
        let response = self.send(&request).await?;

        let body: serde_json::Value = response.json()?;
        let token = extract_access_token(&body).ok_or_else(|| {
            ApiError::InvalidResponse("Verification response carried no access credential".into())
        })?;
        self.credentials
            .set(Credential::new(token), self.settings.credential_ttl);
        info!("Signed in");
        Ok(response.message())
    }

    pub async fn resend_two_factor(&self, token: &str) -> Result<String, ApiError> {
        let path = format!("{}/{}", TWO_FACTOR_RESEND_PATH, segment(token));
        Ok(self.send(&ApiRequest::post(path)).await?.message())
    }

    /// Request a reset code. The server redirects to the code entry screen.
    pub async fn forgot_password(&self, email: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).json(&EmailRequest {
            email: email.to_string(),
        })?;
        Ok(self.send(&request).await?.message())
    }

    /// Verify a reset code. The server redirects to the new-password screen
    /// with a reset token.
    pub async fn verify_password_reset(&self, email: &str, otp: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(FORGOT_PASSWORD_VERIFY_PATH).json(&OtpVerifyRequest {
            otp: otp.to_string(),
            email: email.to_string(),
        })?;
        Ok(self.send(&request).await?.message())
    }

    pub async fn confirm_password_reset(
        &self,
        reset_token: &str,
        input: &ResetPasswordRequest,
    ) -> Result<String, ApiError> {
        let path = format!("{}/{}", RESET_PASSWORD_CONFIRM_PATH, segment(reset_token));
        let request = ApiRequest::post(path).json(input)?;
        Ok(self.send(&request).await?.message())
    }

    // ===== Profile Endpoints =====

    /// Fetch the signed-in user's profile
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        self.send(&ApiRequest::get(PROFILE_PATH)).await?.data()
    }

    pub async fn update_profile(&self, input: &UpdateProfileRequest) -> Result<String, ApiError> {
        let request = ApiRequest::put(PROFILE_PATH).json(input)?;
        Ok(self.send(&request).await?.message())
    }

    /// Upload a new avatar as multipart form data
    pub async fn upload_photo(&self, photo: &PhotoUpload) -> Result<String, ApiError> {
        let request = ApiRequest::put(PHOTO_PATH).multipart(vec![FilePart {
            field: PHOTO_FIELD.to_string(),
            file_name: photo.file_name.clone(),
            mime_type: photo.mime_type.to_string(),
            bytes: photo.bytes.clone(),
        }]);
        Ok(self.send(&request).await?.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("a.b-c_d"), "a.b-c_d");
        assert_eq!(segment("a/b"), "a%2Fb");
    }

    #[test]
    fn test_response_helpers() {
        let response = ApiResponse {
            status: StatusCode::OK,
            body: r#"{"success":true,"message":"Profile retrieved","data":{"data":{"id":"u1","email":"a@b.c"}}}"#.into(),
        };
        assert_eq!(response.message(), "Profile retrieved");
        let profile: UserProfile = response.data().unwrap();
        assert_eq!(profile.id, "u1");

        let empty = ApiResponse {
            status: StatusCode::OK,
            body: String::new(),
        };
        assert_eq!(empty.message(), "");
        assert!(matches!(
            empty.data::<UserProfile>(),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
