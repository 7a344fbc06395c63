use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use khilonjiya::auth::{login_failure_message, AuthService};

use super::AppContext;

pub async fn run_login(ctx: &AppContext, email: String, password: Option<String>) -> Result<()> {
    let session_store = ctx.session_store()?;

    if session_store.is_logged_in() {
        println!("⚠️  You are already signed in.");
        println!("Signing in again will replace your current session.\n");
    }

    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    println!("🔐 Signing in to khilonjiya.com...\n");

    let backend = ctx.backend();
    backend
        .initialize()
        .await
        .context("Supabase backend initialization failed")?;

    let auth = AuthService::new(Arc::clone(&backend));
    let response = match auth.sign_in(&email, &password).await {
        Ok(response) => response,
        Err(e) => bail!(login_failure_message(&e)),
    };

    session_store.save_session(&response.session)?;

    let who = response.user.email.as_deref().unwrap_or(&response.user.id);
    println!("✅ Signed in as {}", who);

    Ok(())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}
