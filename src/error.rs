//! Error types for the Voyager session client
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the Voyager session client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Session Errors
    // ============================================================================
    #[error("Session for '{user_id}' has expired")]
    SessionExpired { user_id: String },

    #[error("Login handshake for '{user_id}' did not yield an anti-forgery token (HTTP {status})")]
    CsrfTokenMissing { user_id: String, status: u16 },

    #[error("Login for '{user_id}' requires out-of-band verification")]
    ChallengePending { user_id: String },

    #[error("Authentication failed for '{user_id}'{}: {reason}", fmt_status(.status))]
    AuthenticationFailed {
        user_id: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Not authenticated (session is {state})")]
    NotAuthenticated { state: String },

    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Invalid page size: {page_size}")]
    InvalidPageSize { page_size: usize },

    #[error("Page {page_index} at cursor {cursor} failed after {fetched} elements: {source}")]
    PartialPageFailure {
        cursor: usize,
        page_index: usize,
        fetched: usize,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Cookie storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a session expired error
    pub fn session_expired(user_id: impl Into<String>) -> Self {
        Self::SessionExpired {
            user_id: user_id.into(),
        }
    }

    /// Create an authentication failure
    pub fn auth_failed(
        user_id: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        Self::AuthenticationFailed {
            user_id: user_id.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Check if the upstream signalled throttling
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::RateLimited { .. } => true,
            Error::PartialPageFailure { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }

    /// Check if this error belongs to the authentication family
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::SessionExpired { .. }
                | Error::CsrfTokenMissing { .. }
                | Error::ChallengePending { .. }
                | Error::AuthenticationFailed { .. }
                | Error::NotAuthenticated { .. }
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            Error::SessionExpired { .. } => true,
            _ => false,
        }
    }

    /// Produce an owned copy of the error that can be handed to every waiter
    /// of a shared handshake. Errors carrying non-cloneable sources collapse
    /// into `AuthenticationFailed` with the original message.
    pub(crate) fn share(&self, user_id: &str) -> Self {
        match self {
            Error::SessionExpired { user_id } => Error::session_expired(user_id.clone()),
            Error::CsrfTokenMissing { user_id, status } => Error::CsrfTokenMissing {
                user_id: user_id.clone(),
                status: *status,
            },
            Error::ChallengePending { user_id } => Error::ChallengePending {
                user_id: user_id.clone(),
            },
            Error::AuthenticationFailed {
                user_id,
                status,
                reason,
            } => Error::auth_failed(user_id.clone(), *status, reason.clone()),
            Error::RateLimited {
                retry_after_seconds,
            } => Error::RateLimited {
                retry_after_seconds: *retry_after_seconds,
            },
            Error::Timeout { timeout_ms } => Error::Timeout {
                timeout_ms: *timeout_ms,
            },
            Error::HttpStatus { status, body } => Error::http_status(*status, body.clone()),
            other => Error::auth_failed(user_id, None, other.to_string()),
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
