//! Supabase backend client.
//!
//! A thin reqwest-based client covering what the app needs at startup and
//! in the login flow: the auth health probe, password sign-in and sign-out,
//! auth state notifications and read queries against the REST API.

mod auth;
mod client;
mod connector;
mod http;
#[cfg(test)]
mod test_server;
mod types;

pub use auth::AuthClient;
pub use client::{ClientOptions, QueryBuilder, SupabaseClient, DEFAULT_TIMEOUT_SECS};
pub use connector::{BackendClient, BackendConnector, SupabaseConnector};
pub use types::{AuthChangeEvent, AuthResponse, AuthStateChange, Session, User};
