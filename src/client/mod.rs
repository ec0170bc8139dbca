//! Client Module
//!
//! Outbound HTTP client and inbound rate limiting.

pub mod http;
pub mod rate_limiter;

pub use http::{classify_failure, is_rate_limit_error, HttpClient};
pub use rate_limiter::RateLimitTracker;
