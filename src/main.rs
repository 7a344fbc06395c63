use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod command;

use cli::{Cli, Commands};
use command::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = AppContext::from_cli(&cli);

    match cli.command {
        Some(Commands::Status) => {
            command::run_status(&ctx).await?;
        }
        Some(Commands::Check) => {
            command::run_check(&ctx).await?;
        }
        Some(Commands::Login { email, password }) => {
            command::run_login(&ctx, email, password).await?;
        }
        Some(Commands::Logout) => {
            command::run_logout(&ctx).await?;
        }
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'khilonjiya check' to verify the Supabase connection.");
        }
    }

    Ok(())
}
