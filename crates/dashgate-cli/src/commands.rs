//! Subcommand flows. Each one only calls the client; expired sessions,
//! redirects and sign-out are handled inside `ApiClient`.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dashgate_core::api::RedirectTarget;
use dashgate_core::auth::{FileCredentialStore, KeyringCredentialStore, PersistentCookieJar};
use dashgate_core::config::CredentialBackend;
use dashgate_core::models::{
    LoginRequest, PhotoUpload, RegisterRequest, ResetPasswordRequest, UpdateProfileRequest,
};
use dashgate_core::{ApiClient, ApiError, Config, CredentialStore};
use tracing::{debug, warn};
use url::Url;

use crate::terminal::{TerminalNavigator, TerminalNotifier};

/// Cookie jar file in the cache directory
const COOKIE_FILE: &str = "cookies.json";

/// Name of the server-managed refresh cookie
const REFRESH_COOKIE: &str = "refreshToken";

pub struct App {
    pub client: ApiClient,
    config: Config,
    cookies: Arc<PersistentCookieJar>,
}

impl App {
    pub fn new(config: Config, api_url: Option<String>) -> Result<Self> {
        let mut settings = config.settings();
        if let Some(url) = api_url {
            settings.base_url = url;
        }

        let cache_dir = config.cache_dir()?;
        let credentials: Arc<dyn CredentialStore> = match config.credential_backend {
            CredentialBackend::File => Arc::new(FileCredentialStore::new(cache_dir.clone())),
            CredentialBackend::Keyring => {
                Arc::new(KeyringCredentialStore::new(settings.base_url.clone()))
            }
        };
        let cookies = Arc::new(PersistentCookieJar::load(cache_dir.join(COOKIE_FILE)));

        debug!(base_url = %settings.base_url, backend = ?config.credential_backend, "Creating client");
        let client = ApiClient::with_cookie_jar(
            settings,
            credentials,
            Arc::new(TerminalNavigator),
            Arc::new(TerminalNotifier),
            Arc::clone(&cookies),
        )
        .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            cookies,
        })
    }

    fn remember_email(&mut self, email: &str) {
        if self.config.last_email.as_deref() == Some(email) {
            return;
        }
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    // ===== Sign-in =====

    pub async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt_line("Email: ")?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        self.remember_email(&email);

        match self.client.login(&LoginRequest { email, password }).await {
            Ok(message) => {
                println!("{}", message);
                Ok(())
            }
            Err(ApiError::Redirect { location, .. }) => {
                // Let the redirect notice print before prompting
                self.client.flush_navigation().await;
                let target = RedirectTarget::new(location);
                if let Some(reset_token) = target.query_param("reset_token") {
                    return self.change_password(&reset_token).await;
                }
                let token = target
                    .query_param("token")
                    .with_context(|| format!("Unexpected sign-in redirect to {}", target.as_str()))?;
                self.verify_two_factor(&token, None).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn register(&mut self, email: String, first_name: String, last_name: String) -> Result<()> {
        let password = rpassword::prompt_password("Password: ")?;
        let confirm_password = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm_password {
            bail!("Passwords do not match");
        }

        let input = RegisterRequest {
            email: email.clone(),
            password,
            confirm_password,
            first_name,
            last_name,
        };
        let message = self.client.register(&input).await?;
        self.remember_email(&email);
        println!("{}", message);
        Ok(())
    }

    pub async fn verify_two_factor(&self, token: &str, otp: Option<String>) -> Result<()> {
        let otp = match otp {
            Some(otp) => otp,
            None => prompt_line("Verification code: ")?,
        };
        let message = self.client.verify_two_factor(token, &otp).await?;
        println!("{}", if message.is_empty() { "Signed in" } else { message.as_str() });
        Ok(())
    }

    pub async fn resend_two_factor(&self, token: &str) -> Result<()> {
        match self.client.resend_two_factor(token).await {
            Ok(message) => {
                println!("{}", message);
                Ok(())
            }
            Err(e) if e.is_token_expired() => {
                bail!("The sign-in challenge has expired, run `dashgate login` again")
            }
            Err(e) => Err(e.into()),
        }
    }

    // ===== Password reset =====

    pub async fn forgot_password(&mut self, email: &str) -> Result<()> {
        self.remember_email(email);
        match self.client.forgot_password(email).await {
            Ok(message) => println!("{}", message),
            Err(ApiError::Redirect { .. }) => {
                self.client.flush_navigation().await;
                println!("Reset code sent to {}", email);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    pub async fn reset_password(&self, email: &str, otp: Option<String>) -> Result<()> {
        let otp = match otp {
            Some(otp) => otp,
            None => prompt_line("Reset code: ")?,
        };
        match self.client.verify_password_reset(email, &otp).await {
            Ok(message) => {
                println!("{}", message);
                Ok(())
            }
            Err(ApiError::Redirect { location, .. }) => {
                self.client.flush_navigation().await;
                let target = RedirectTarget::new(location);
                let reset_token = target
                    .query_param("reset_token")
                    .with_context(|| format!("Unexpected reset redirect to {}", target.as_str()))?;
                self.change_password(&reset_token).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn change_password(&self, reset_token: &str) -> Result<()> {
        let password = rpassword::prompt_password("New password: ")?;
        let password_confirm = rpassword::prompt_password("Confirm new password: ")?;
        if password != password_confirm {
            bail!("Passwords do not match");
        }

        let input = ResetPasswordRequest {
            password,
            password_confirm,
        };
        let message = self.client.confirm_password_reset(reset_token, &input).await?;
        println!("{}", message);
        Ok(())
    }

    // ===== Profile =====

    pub async fn profile(&self, json: bool) -> Result<()> {
        let profile = self.client.fetch_profile().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&profile)?);
            return Ok(());
        }

        println!("{}", profile.full_name());
        println!("  Email:    {}", profile.email);
        if let Some(phone) = &profile.phone_number {
            println!("  Phone:    {}", phone);
        }
        if let Some(role) = &profile.role {
            println!("  Role:     {}", role);
        }
        if let Some(country) = &profile.country {
            println!("  Country:  {}", country);
        }
        println!("  Verified: {}", if profile.email_verified { "yes" } else { "no" });
        if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
            println!();
            println!("{}", bio);
        }
        Ok(())
    }

    pub async fn edit_profile(&self, changes: ProfileChanges) -> Result<()> {
        let current = self.client.fetch_profile().await?;
        let input = changes.apply(UpdateProfileRequest::from_profile(&current));
        let message = self.client.update_profile(&input).await?;
        println!("{}", message);
        Ok(())
    }

    pub async fn upload_photo(&self, path: &Path) -> Result<()> {
        let photo = PhotoUpload::from_path(path)?;
        let message = self.client.upload_photo(&photo).await?;
        println!("{}", message);
        Ok(())
    }

    // ===== Session =====

    pub async fn logout(&self) -> Result<()> {
        let acknowledged = self.client.logout().await;
        self.cookies.clear();
        if acknowledged {
            println!("Signed out");
        } else {
            println!("Signed out locally (server did not confirm)");
        }
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        let settings = self.client.settings();
        println!("API: {}", settings.base_url);

        match self.client.credentials().entry() {
            Some(entry) if !entry.is_expired() => {
                println!(
                    "Signed in, access credential expires in {} minutes",
                    entry.minutes_until_expiry()
                );
            }
            Some(_) => println!("Access credential expired"),
            None => println!("Not signed in"),
        }

        let origin = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid API URL {}", settings.base_url))?;
        if self.cookies.contains(&origin, REFRESH_COOKIE) {
            println!("Refresh cookie held");
        }
        if let Some(email) = &self.config.last_email {
            println!("Last email: {}", email);
        }
        Ok(())
    }
}

/// Fields given on the command line for `edit-profile`
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

impl ProfileChanges {
    fn apply(self, mut input: UpdateProfileRequest) -> UpdateProfileRequest {
        if let Some(email) = self.email {
            input.email = email;
        }
        if let Some(first_name) = self.first_name {
            input.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            input.last_name = last_name;
        }
        if let Some(bio) = self.bio {
            input.bio = bio;
        }
        if let Some(phone_number) = self.phone_number {
            input.phone_number = phone_number;
        }
        input
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_changes_keep_unset_fields() {
        let current = UpdateProfileRequest {
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            bio: "".into(),
            phone_number: "+44 20 0000".into(),
        };
        let changes = ProfileChanges {
            bio: Some("Analyst".into()),
            ..Default::default()
        };

        let updated = changes.apply(current);
        assert_eq!(updated.bio, "Analyst");
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.phone_number, "+44 20 0000");
    }
}
