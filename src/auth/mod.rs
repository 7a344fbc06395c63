//! Auth facade used by the login flow.

mod service;
mod validation;

pub use service::{login_failure_message, AuthService, PasswordAuth, GENERIC_LOGIN_FAILURE};
pub use validation::{validate_email, validate_password, MIN_PASSWORD_LEN};
