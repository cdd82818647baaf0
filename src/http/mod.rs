//! HTTP module
//!
//! Provides the request transport and client-side request pacing.
//!
//! # Features
//!
//! - **Transport trait**: one request in, one response out, no retries
//! - **Cookie plumbing**: outgoing `Cookie` header, parsed `Set-Cookie`s
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Caller retry**: backoff on `RateLimited` for whole operations

mod rate_limit;
mod retry;
mod transport;

pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::retry_rate_limited;
pub use transport::{HttpTransport, RequestBody, Transport, TransportRequest, TransportResponse};
