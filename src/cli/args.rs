use clap::{Parser, Subcommand};
use std::path::PathBuf;

use khilonjiya::config::DEFAULT_ENV_FILE;
use khilonjiya::startup::DEFAULT_MAX_ATTEMPTS;

/// khilonjiya - Supabase backend bootstrap and auth CLI
#[derive(Parser)]
#[command(name = "khilonjiya")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Env file holding SUPABASE_URL and SUPABASE_ANON_KEY
    #[arg(long, env = "KHILONJIYA_ENV_FILE", default_value = DEFAULT_ENV_FILE, global = true)]
    pub env_file: PathBuf,

    /// Directory to store cached session data. Defaults to ~/.khilonjiya
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,

    /// Maximum backend initialization attempts
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, global = true)]
    pub max_attempts: u32,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show where credentials come from and who is signed in
    Status,
    /// Initialize the backend client and report readiness
    Check,
    /// Sign in with email and password
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password (prompted for when absent)
        #[arg(long, env = "KHILONJIYA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and remove the stored session
    Logout,
}
