//! Common types used throughout the crate
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl Method {
    /// Whether the method changes server state and therefore needs the
    /// anti-forgery token
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::GET)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(s)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

// ============================================================================
// CSRF Scope
// ============================================================================

/// Which requests carry the anti-forgery token header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsrfScope {
    /// Only POST/PUT/PATCH/DELETE
    #[default]
    Mutating,
    /// Every authorized request
    All,
}

impl CsrfScope {
    /// Whether a request with this method gets the token
    pub fn applies_to(self, method: Method) -> bool {
        match self {
            CsrfScope::Mutating => method.is_mutating(),
            CsrfScope::All => true,
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Backoff strategy for callers retrying a throttled collection fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

/// Retry delay policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    /// Strategy
    #[serde(default)]
    pub backoff_type: BackoffType,
    /// Delay for the first retry, in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Upper bound for any delay, in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_initial_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    60_000
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl Backoff {
    /// Calculate the delay before retry number `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = Duration::from_millis(self.initial_ms);
        let delay = match self.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial * (attempt + 1),
            BackoffType::Exponential => initial * 2u32.saturating_pow(attempt),
        };

        std::cmp::min(delay, Duration::from_millis(self.max_ms))
    }

    /// Delay honouring a server-provided retry-after hint
    pub fn delay_with_hint(&self, attempt: u32, retry_after_seconds: u64) -> Duration {
        std::cmp::max(self.delay(attempt), Duration::from_secs(retry_after_seconds))
    }
}
