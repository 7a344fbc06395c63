//! Backend startup: credential resolution, bounded retry and the
//! single-flight initialization guard.

mod retry;
mod service;

pub use retry::{retry_linear, RetriesExhausted, RetryPolicy, DEFAULT_DELAY_UNIT, DEFAULT_MAX_ATTEMPTS};
pub use service::{InitializationState, SupabaseService};
