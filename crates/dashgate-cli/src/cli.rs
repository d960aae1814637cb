use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dashgate")]
#[command(about = "Sign in to the dashboard account API and manage your profile")]
#[command(version)]
pub struct Cli {
    /// API origin, overrides the configured one
    #[arg(long, global = true, env = "DASHGATE_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password, then complete the second factor
    Login {
        /// Account email (defaults to the last one used)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,
    },

    /// Complete sign-in with the code sent by email
    #[command(name = "verify-2fa")]
    VerifyTwoFactor {
        /// Challenge token from the sign-in redirect
        #[arg(short, long)]
        token: String,

        /// Six-digit code (prompted for when omitted)
        #[arg(long)]
        otp: Option<String>,
    },

    /// Send a new sign-in code
    #[command(name = "resend-2fa")]
    ResendTwoFactor {
        #[arg(short, long)]
        token: String,
    },

    /// Ask for a password reset code
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },

    /// Enter the reset code, then choose a new password
    ResetPassword {
        #[arg(short, long)]
        email: String,

        /// Code from the reset email (prompted for when omitted)
        #[arg(long)]
        otp: Option<String>,
    },

    /// Set a new password with a reset token
    ChangePassword {
        /// Reset token from the reset or forced-change redirect
        #[arg(short, long)]
        token: String,
    },

    /// Show the signed-in profile
    Profile {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Update profile fields; omitted fields keep their current value
    EditProfile {
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        bio: Option<String>,

        #[arg(long)]
        phone_number: Option<String>,
    },

    /// Upload a profile photo (jpg, png or gif)
    UploadPhoto {
        path: PathBuf,
    },

    /// Sign out on this machine and on the server
    Logout,

    /// Show whether a session is held and when it expires
    Status,
}
