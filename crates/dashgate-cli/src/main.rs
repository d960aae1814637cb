//! dashgate - terminal front end for the dashboard account API.
//!
//! Every subcommand goes through the core `ApiClient`, so an expired session
//! is refreshed transparently and a failed refresh sends the user back to
//! `dashgate login`.

mod cli;
mod commands;
mod terminal;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use dashgate_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::{App, ProfileChanges};

/// Log file prefix in the cache directory
const LOG_FILE: &str = "dashgate.log";

/// Filter for the file log, independent of RUST_LOG
const FILE_LOG_FILTER: &str = "dashgate=debug,dashgate_core=debug";

/// Stderr honours RUST_LOG (default warn); the cache directory gets a daily
/// debug log. The returned guard flushes the file log on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_LOG_FILTER));
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut app = App::new(config, cli.api_url)?;

    let result = match cli.command {
        Commands::Login { email } => app.login(email).await,
        Commands::Register {
            email,
            first_name,
            last_name,
        } => app.register(email, first_name, last_name).await,
        Commands::VerifyTwoFactor { token, otp } => app.verify_two_factor(&token, otp).await,
        Commands::ResendTwoFactor { token } => app.resend_two_factor(&token).await,
        Commands::ForgotPassword { email } => app.forgot_password(&email).await,
        Commands::ResetPassword { email, otp } => app.reset_password(&email, otp).await,
        Commands::ChangePassword { token } => app.change_password(&token).await,
        Commands::Profile { json } => app.profile(json).await,
        Commands::EditProfile {
            email,
            first_name,
            last_name,
            bio,
            phone_number,
        } => {
            app.edit_profile(ProfileChanges {
                email,
                first_name,
                last_name,
                bio,
                phone_number,
            })
            .await
        }
        Commands::UploadPhoto { path } => app.upload_photo(&path).await,
        Commands::Logout => app.logout().await,
        Commands::Status => app.status(),
    };

    // Show any navigation the client scheduled before exiting
    app.client.flush_navigation().await;
    result
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring unreadable config: {:#}", e);
            Config::default()
        }
    };
    let guard = init_tracing(config.cache_dir().ok().as_deref());
    info!("dashgate starting");

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
}
