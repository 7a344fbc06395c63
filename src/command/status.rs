use anyhow::Result;
use khilonjiya::config::{mask_key, redact_url};

use super::AppContext;

pub async fn run_status(ctx: &AppContext) -> Result<()> {
    match ctx.resolver().resolve() {
        Ok(resolved) => {
            println!("✅ Supabase credentials found");
            println!("   Source: {}", resolved.source);
            println!("   URL: {}", redact_url(&resolved.credentials.url));
            println!("   Anon key: {}", mask_key(&resolved.credentials.key));
        }
        Err(e) => {
            println!("❌ {}", e);
            println!(
                "   Set SUPABASE_URL and SUPABASE_ANON_KEY in {} or the environment.",
                ctx.env_file.display()
            );
        }
    }

    let session_store = ctx.session_store()?;
    match session_store.get_session()? {
        Some(session) => {
            let who = session.user.email.as_deref().unwrap_or(&session.user.id);
            println!("✅ Signed in as {}", who);
            println!("   User ID: {}", session.user.id);
            if session.is_expired() {
                println!("   ⚠️  Session expired; it will be refreshed on the next 'khilonjiya check'.");
            }
        }
        None => {
            println!("❌ Not signed in");
            println!("   Run 'khilonjiya login --email <EMAIL>' to sign in.");
        }
    }

    Ok(())
}
