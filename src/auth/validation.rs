//! Login form validation.
//!
//! Each check returns a message ready to show next to the field.

use regex::Regex;
use std::sync::OnceLock;

/// Shortest password the auth server accepts
pub const MIN_PASSWORD_LEN: usize = 6;

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[\w.+-]+@([\w-]+\.)+[\w-]{2,}$").expect("email regex is valid")
    })
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Please enter your email".to_string());
    }
    if !email_regex().is_match(email) {
        return Err("Please enter a valid email".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Please enter your password".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}
