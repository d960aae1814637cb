//! Response-side handling of expired sessions and policy redirects.
//!
//! Each response is classified against its attempt context:
//!
//! | status            | retries left | disposition                          |
//! |-------------------|--------------|--------------------------------------|
//! | 301 / 302         | any          | `Redirect`: notify, navigate, reject |
//! | 401               | yes          | `Refresh`: refresh, then retry       |
//! | 401               | no           | `Exhausted`: propagate untouched     |
//! | anything else     | any          | `PassThrough`                        |
//!
//! With `MAX_AUTH_RETRIES = 1` a request is refreshed and retried at most once.
//!
//! Concurrent requests that hit a 401 while a refresh is outstanding share
//! that one refresh call and all see the same credential or the same failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialStore};
use crate::config::ClientSettings;
use crate::models::extract_access_token;
use crate::navigation::{NavigationScheduler, Notice, Notifier};

use super::request::RequestContext;

pub const REFRESH_PATH: &str = "/api/v1/auth/refresh-token";

const PASSWORD_CHANGE_MESSAGE: &str =
    "You are required by admin to change your password. Redirecting...";

const SESSION_EXPIRED_MESSAGE: &str = "Session has expired";

/// Base used to resolve relative redirect targets for inspection only.
const RELATIVE_BASE: &str = "http://localhost/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the response to the caller as-is
    PassThrough,
    /// Policy redirect: navigate and reject, never retried
    Redirect,
    /// Expired credential on a first attempt: refresh, then retry once
    Refresh,
    /// Expired credential on the retry: give up
    Exhausted,
}

pub fn classify(status: StatusCode, context: &RequestContext) -> Disposition {
    match status {
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => Disposition::Redirect,
        StatusCode::UNAUTHORIZED if context.can_retry() => Disposition::Refresh,
        StatusCode::UNAUTHORIZED => Disposition::Exhausted,
        _ => Disposition::PassThrough,
    }
}

/// Where a 301/302 wants to send the user.
///
/// The body is a bare URL string, usually JSON-quoted. The `Location` header
/// is the fallback for plain redirects.
pub fn redirect_target(headers: &HeaderMap, body: &str) -> Option<String> {
    let body = body.trim();
    if let Ok(Value::String(target)) = serde_json::from_str::<Value>(body) {
        if !target.is_empty() {
            return Some(target);
        }
    }
    if let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
        if !location.is_empty() {
            return Some(location.to_string());
        }
    }
    if body.starts_with('/') || body.starts_with("http://") || body.starts_with("https://") {
        return Some(body.to_string());
    }
    None
}

/// A redirect target as sent by the server, with helpers to inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    raw: String,
}

impl RedirectTarget {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Targets that carry the policy marker (forced password change)
    pub fn is_policy(&self, marker: &str) -> bool {
        !marker.is_empty() && self.raw.contains(marker)
    }

    fn parsed(&self) -> Option<Url> {
        Url::parse(&self.raw)
            .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(&self.raw)))
            .ok()
    }

    /// Path component, for absolute and relative targets alike
    pub fn path(&self) -> Option<String> {
        self.parsed().map(|u| u.path().to_string())
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.parsed()?
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RefreshFailure(String);

type RefreshOutcome = Result<Credential, RefreshFailure>;

struct InFlight {
    id: u64,
    outcome: Shared<BoxFuture<'static, RefreshOutcome>>,
}

/// Everything a refresh needs, moved into the refresh task.
struct RefreshEffects {
    http: Client,
    refresh_url: String,
    credentials: Arc<dyn CredentialStore>,
    navigation: Arc<NavigationScheduler>,
    notifier: Arc<dyn Notifier>,
    credential_ttl: Duration,
    sign_in_path: String,
    refresh_calls: AtomicU64,
}

impl RefreshEffects {
    /// One refresh call plus its side effects. Runs once per in-flight
    /// refresh no matter how many requests are waiting on it.
    async fn run(&self) -> RefreshOutcome {
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        info!("Access credential expired, refreshing session");

        match self.request_credential().await {
            Ok(credential) => {
                self.credentials.set(credential.clone(), self.credential_ttl);
                info!("Session refreshed");
                Ok(credential)
            }
            Err(failure) => {
                warn!(reason = %failure, "Session refresh failed, signing out");
                self.credentials.remove();
                self.notifier.notify(Notice::error(SESSION_EXPIRED_MESSAGE));
                self.navigation.navigate_now(&self.sign_in_path);
                Err(failure)
            }
        }
    }

    /// The refresh cookie rides along via the cookie jar; no Authorization
    /// header is sent.
    async fn request_credential(&self) -> RefreshOutcome {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RefreshFailure(format!("Refresh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure(format!("Refresh endpoint returned {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RefreshFailure(format!("Failed to parse refresh response: {}", e)))?;

        extract_access_token(&body)
            .map(Credential::new)
            .ok_or_else(|| RefreshFailure("Refresh response carried no access credential".into()))
    }
}

/// Empty the slot if it still holds flight `id`
fn clear_flight(slot: &Mutex<Option<InFlight>>, id: u64) {
    let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
    if slot.as_ref().is_some_and(|flight| flight.id == id) {
        *slot = None;
    }
}

pub struct RefreshCoordinator {
    effects: Arc<RefreshEffects>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
    policy_marker: String,
    redirect_delay: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        http: Client,
        settings: &ClientSettings,
        credentials: Arc<dyn CredentialStore>,
        navigation: Arc<NavigationScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let refresh_url = format!("{}{}", settings.base_url.trim_end_matches('/'), REFRESH_PATH);
        Self {
            effects: Arc::new(RefreshEffects {
                http,
                refresh_url,
                credentials,
                navigation,
                notifier,
                credential_ttl: settings.credential_ttl,
                sign_in_path: settings.sign_in_path.clone(),
                refresh_calls: AtomicU64::new(0),
            }),
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            policy_marker: settings.policy_marker.clone(),
            redirect_delay: settings.redirect_delay,
        }
    }

    /// Number of refresh calls issued so far
    pub fn refresh_count(&self) -> u64 {
        self.effects.refresh_calls.load(Ordering::Relaxed)
    }

    /// Get a fresh credential for a request that was rejected with 401.
    ///
    /// `sent_with` is the credential the rejected attempt carried. If the
    /// store already holds a different live credential, another request has
    /// refreshed in the meantime and that credential is returned without a
    /// new refresh call.
    pub async fn refresh(&self, sent_with: Option<&Credential>) -> Result<Credential, RefreshFailure> {
        if let Some(current) = self.effects.credentials.get() {
            if sent_with != Some(&current) {
                debug!("Credential already replaced, reusing it");
                return Ok(current);
            }
        }

        self.join_or_start().await
    }

    /// Join the outstanding refresh or start one. The refresh runs as its own
    /// task, so it completes and clears its slot even if every waiter is
    /// cancelled.
    fn join_or_start(&self) -> Shared<BoxFuture<'static, RefreshOutcome>> {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(flight) = slot.as_ref() {
            debug!(refresh_id = flight.id, "Joining in-flight session refresh");
            return flight.outcome.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let effects = Arc::clone(&self.effects);
        let in_flight = Arc::clone(&self.in_flight);
        let task = tokio::spawn(async move {
            let outcome = effects.run().await;
            clear_flight(&in_flight, id);
            outcome
        });

        let outcome = async move {
            task.await
                .unwrap_or_else(|e| Err(RefreshFailure(format!("Refresh task failed: {}", e))))
        }
        .boxed()
        .shared();
        *slot = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Warn about policy redirects, then navigate to the exact target after
    /// the configured delay.
    pub fn handle_redirect(&self, target: &str) {
        if RedirectTarget::new(target).is_policy(&self.policy_marker) {
            warn!(location = %target, "Policy redirect, password change required");
            self.effects
                .notifier
                .notify(Notice::warning(PASSWORD_CHANGE_MESSAGE));
        } else {
            info!(location = %target, "Server requested redirect");
        }
        self.effects
            .navigation
            .schedule(target.to_string(), self.redirect_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::MAX_AUTH_RETRIES;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify() {
        let first = RequestContext::initial();
        let retry = first.retry_with(Credential::new("fresh"));

        assert_eq!(classify(StatusCode::OK, &first), Disposition::PassThrough);
        assert_eq!(classify(StatusCode::BAD_REQUEST, &first), Disposition::PassThrough);
        assert_eq!(classify(StatusCode::FORBIDDEN, &first), Disposition::PassThrough);
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR, &first), Disposition::PassThrough);
        assert_eq!(classify(StatusCode::SEE_OTHER, &first), Disposition::PassThrough);

        assert_eq!(classify(StatusCode::FOUND, &first), Disposition::Redirect);
        assert_eq!(classify(StatusCode::MOVED_PERMANENTLY, &retry), Disposition::Redirect);

        assert_eq!(classify(StatusCode::UNAUTHORIZED, &first), Disposition::Refresh);
        assert_eq!(classify(StatusCode::UNAUTHORIZED, &retry), Disposition::Exhausted);
    }

    #[test]
    fn test_classify_follows_retry_budget() {
        let mut context = RequestContext::initial();
        for attempt in 0..MAX_AUTH_RETRIES {
            assert_eq!(
                classify(StatusCode::UNAUTHORIZED, &context),
                Disposition::Refresh,
                "attempt {} should still refresh",
                attempt
            );
            context = context.retry_with(Credential::new(format!("fresh-{}", attempt)));
        }
        assert_eq!(context.attempt(), MAX_AUTH_RETRIES);
        assert_eq!(classify(StatusCode::UNAUTHORIZED, &context), Disposition::Exhausted);
    }

    #[test]
    fn test_redirect_target_from_json_string() {
        let headers = HeaderMap::new();
        assert_eq!(
            redirect_target(&headers, r#""/auth/forgot-password?x=1""#),
            Some("/auth/forgot-password?x=1".to_string())
        );
        assert_eq!(
            redirect_target(&headers, "http://localhost:3000/auth/2fa?token=abc"),
            Some("http://localhost:3000/auth/2fa?token=abc".to_string())
        );
        assert_eq!(redirect_target(&headers, r#"{"message":"moved"}"#), None);
        assert_eq!(redirect_target(&headers, ""), None);
    }

    #[test]
    fn test_redirect_target_falls_back_to_location() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/auth/signin?error=500"));
        assert_eq!(
            redirect_target(&headers, "<a href=\"/auth/signin?error=500\">Found</a>."),
            Some("/auth/signin?error=500".to_string())
        );
    }

    #[test]
    fn test_redirect_target_inspection() {
        let target = RedirectTarget::new("/auth/forgot-password?x=1");
        assert!(target.is_policy("forgot-password"));
        assert_eq!(target.path().as_deref(), Some("/auth/forgot-password"));
        assert_eq!(target.query_param("x").as_deref(), Some("1"));

        let target = RedirectTarget::new("http://localhost:3000/auth/2fa?token=a.b.c");
        assert!(!target.is_policy("forgot-password"));
        assert_eq!(target.path().as_deref(), Some("/auth/2fa"));
        assert_eq!(target.query_param("token").as_deref(), Some("a.b.c"));
        assert_eq!(target.query_param("missing"), None);

        assert!(!RedirectTarget::new("/anything").is_policy(""));
    }
}
