use std::sync::Arc;

use anyhow::Result;
use khilonjiya::auth::AuthService;
use tracing::warn;

use super::AppContext;

pub async fn run_logout(ctx: &AppContext) -> Result<()> {
    let session_store = ctx.session_store()?;

    let Some(session) = session_store.get_session()? else {
        println!("You are not signed in.");
        return Ok(());
    };

    let backend = ctx.backend();
    match backend.initialize().await {
        Ok(()) => {
            backend.client()?.auth().restore_session(session);
            let auth = AuthService::new(Arc::clone(&backend));
            if let Err(e) = auth.sign_out().await {
                warn!("Server-side sign out failed: {}", e);
            }
        }
        Err(e) => warn!("Backend unavailable, removing local session only: {}", e),
    }

    session_store.remove_session()?;
    println!("✅ Successfully signed out.");

    Ok(())
}
