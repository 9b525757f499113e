//! HTTP client module
//!
//! The transport every Service Layer call goes through.
//!
//! # Features
//!
//! - **Automatic Retries**: 429/5xx/timeouts retried with backoff
//! - **Rate Limiting**: Optional token bucket rate limiter using governor
//! - **Session Cookie**: Attaches `B1SESSION` from the session authenticator
//! - **Error Classification**: Non-2xx responses become `UnexpectedResponse`

mod client;
mod rate_limit;

pub use client::{BackoffType, HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
