//! Request transport
//!
//! The session layer talks to the upstream host through the `Transport`
//! trait: one request in, one response out, no retries. `HttpTransport` is
//! the reqwest-backed implementation; tests can substitute their own.

use super::rate_limit::RateLimiter;
use crate::clock::{system_clock, SharedClock};
use crate::config::ClientConfig;
use crate::cookies::{Cookie, CookieSet};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, StringMap};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, COOKIE, RETRY_AFTER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Request body variants
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document
    Json(JsonValue),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
}

/// A single request handed to the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: StringMap,
    /// Optional body
    pub body: Option<RequestBody>,
    /// Cookies to send
    pub cookies: CookieSet,
    /// Override the transport timeout
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Create a request with no headers, body or cookies
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: StringMap::new(),
            body: None,
            cookies: CookieSet::new(),
            timeout: None,
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add several headers
    #[must_use]
    pub fn headers<'a>(mut self, headers: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in headers {
            self.headers.insert(key.clone(), value.clone());
        }
        self
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: Option<RequestBody>) -> Self {
        self.body = body;
        self
    }

    /// Set the cookies
    #[must_use]
    pub fn cookies(mut self, cookies: CookieSet) -> Self {
        self.cookies = cookies;
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What the transport hands back
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Cookies set by the response
    pub cookies: Vec<Cookie>,
    /// Raw body
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::decode(format!("Invalid JSON body (HTTP {}): {e}", self.status)))
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Seconds from the `Retry-After` header, when numeric
    pub fn retry_after(&self) -> Option<u64> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }
}

/// Issues single requests against the upstream host
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request; non-2xx statuses are responses, not errors
    async fn issue(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// reqwest-backed transport with optional client-side pacing
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    rate_limiter: Option<RateLimiter>,
    clock: SharedClock,
}

impl HttpTransport {
    /// Create a transport from the client config
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            timeout: config.request_timeout(),
            rate_limiter: config.rate_limit.as_ref().map(RateLimiter::new),
            clock: system_clock(),
        })
    }

    /// Use a custom clock for `Max-Age` expiry
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, request: TransportRequest) -> Result<TransportResponse> {
        let url = url::Url::parse(&request.url)?;
        let host = url.host_str().unwrap_or_default().to_string();
        let timeout = request.timeout.unwrap_or(self.timeout);

        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self
            .client
            .request(request.method.into(), url)
            .timeout(timeout);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if let Some(cookie_header) = request.cookies.header_value() {
            req = req.header(COOKIE, cookie_header);
        }

        match &request.body {
            Some(RequestBody::Json(body)) => req = req.json(body),
            Some(RequestBody::Form(pairs)) => req = req.form(pairs),
            None => {}
        }

        let response = req.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let now = self.clock.now();
        let cookies: Vec<Cookie> = response
            .cookies()
            .map(|c| convert_cookie(&c, &host, now))
            .collect();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        debug!(
            method = %request.method,
            url = %request.url,
            status,
            set_cookies = cookies.len(),
            "request completed"
        );

        Ok(TransportResponse {
            status,
            headers,
            cookies,
            body,
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> Error {
    if error.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::Http(error)
    }
}

/// Convert a `Set-Cookie` into a stored cookie; domain and path default to
/// the request host and `/`. A `Max-Age` past the representable range never
/// expires.
fn convert_cookie(cookie: &reqwest::cookie::Cookie<'_>, host: &str, now: DateTime<Utc>) -> Cookie {
    let expires_at = match cookie.max_age() {
        Some(max_age) => chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|d| now.checked_add_signed(d)),
        None => cookie.expires().map(DateTime::<Utc>::from),
    };

    Cookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: cookie.domain().unwrap_or(host).to_string(),
        path: cookie.path().unwrap_or("/").to_string(),
        expires_at,
        secure: cookie.secure(),
    }
}
