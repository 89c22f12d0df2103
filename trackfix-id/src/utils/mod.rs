//! Transport helpers shared by the web-service clients

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::RateLimiter;
pub use retry::{retry_transient, RetryConfig};
