use anyhow::{Context, Result};
use khilonjiya::config::redact_url;
use tracing::warn;

use super::AppContext;

pub async fn run_check(ctx: &AppContext) -> Result<()> {
    let backend = ctx.backend();
    backend
        .initialize()
        .await
        .context("Supabase backend initialization failed")?;

    let client = backend.client()?;
    println!(
        "✅ Supabase backend ready at {}",
        redact_url(client.base_url().as_str())
    );

    let session_store = ctx.session_store()?;
    if let Some(session) = session_store.get_session()? {
        let expired = session.is_expired();
        client.auth().restore_session(session);

        if expired {
            match client.auth().refresh_session().await {
                Ok(refreshed) => session_store.save_session(&refreshed)?,
                Err(e) => {
                    warn!("Session refresh failed: {}", e);
                    client.auth().clear_session();
                    session_store.remove_session()?;
                }
            }
        }
    }

    match backend.current_user_id() {
        Some(user_id) => println!("   Current user: {}", user_id),
        None => println!("   No user signed in"),
    }

    Ok(())
}
