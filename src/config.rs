//! Client configuration
//!
//! Everything the session and pagination core needs is injected through
//! `ClientConfig`: target host, page size default, concurrency cap, timeouts,
//! and the cookie storage root. Configs load from YAML (or JSON, which YAML
//! parses as well) and can be built in code.

use crate::error::{Error, Result};
use crate::http::RateLimiterConfig;
use crate::types::{Backoff, CsrfScope, StringMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Client Config
// ============================================================================

/// Complete client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scheme and host of the upstream service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefix prepended to API paths
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path of the login surface
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Session-identifying cookie carrying the anti-forgery token
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Header name for the anti-forgery token
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,

    /// Which requests carry the anti-forgery token
    #[serde(default)]
    pub csrf_scope: CsrfScope,

    /// Default page size for collections
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum page fetches in flight after the first page
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Hard cap on pages per collection
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Transport timeout per request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout per page fetch in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout_seconds: u64,

    /// Timeout for the whole login handshake in seconds
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_seconds: u64,

    /// Directory holding per-user cookie records
    #[serde(default)]
    pub storage_root: Option<PathBuf>,

    /// User agent for the transport
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers sent with every authorized request
    #[serde(default = "default_request_headers")]
    pub default_headers: StringMap,

    /// Headers sent with the login handshake
    #[serde(default = "default_auth_headers")]
    pub auth_headers: StringMap,

    /// Client-side request pacing
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,

    /// Backoff used by callers retrying throttled collections
    #[serde(default)]
    pub retry_backoff: Backoff,

    /// How many times callers retry a throttled collection
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
}

fn default_base_url() -> String {
    "https://www.linkedin.com".to_string()
}

fn default_api_prefix() -> String {
    "/voyager/api".to_string()
}

fn default_login_path() -> String {
    "/uas/authenticate".to_string()
}

fn default_session_cookie() -> String {
    crate::cookies::DEFAULT_SESSION_COOKIE.to_string()
}

fn default_csrf_header() -> String {
    "csrf-token".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_concurrency() -> usize {
    4
}

fn default_max_pages() -> usize {
    200
}

fn default_request_timeout() -> u64 {
    30
}

fn default_page_timeout() -> u64 {
    60
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("voyager-session/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_headers() -> StringMap {
    [
        (
            "user-agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.116 Safari/537.36",
        ),
        ("accept-language", "en-AU,en-GB;q=0.9,en-US;q=0.8,en;q=0.7"),
        ("x-li-lang", "en_US"),
        ("x-restli-protocol-version", "2.0.0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_auth_headers() -> StringMap {
    [
        (
            "X-Li-User-Agent",
            "LIAuthLibrary:0.0.3 com.linkedin.android:4.1.881 Asus_ASUS_Z01QD:android_9",
        ),
        ("User-Agent", "ANDROID OS"),
        ("X-User-Language", "en"),
        ("X-User-Locale", "en_US"),
        ("Accept-Language", "en-us"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            login_path: default_login_path(),
            session_cookie: default_session_cookie(),
            csrf_header: default_csrf_header(),
            csrf_scope: CsrfScope::default(),
            page_size: default_page_size(),
            concurrency: default_concurrency(),
            max_pages: default_max_pages(),
            request_timeout_seconds: default_request_timeout(),
            page_timeout_seconds: default_page_timeout(),
            auth_timeout_seconds: default_auth_timeout(),
            storage_root: None,
            user_agent: default_user_agent(),
            default_headers: default_request_headers(),
            auth_headers: default_auth_headers(),
            rate_limit: None,
            retry_backoff: Backoff::default(),
            rate_limit_retries: default_rate_limit_retries(),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load a config from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a config from a YAML (or JSON) string
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_config("base_url", e.to_string()))?;
        if self.page_size == 0 {
            return Err(Error::invalid_config("page_size", "must be greater than 0"));
        }
        if self.concurrency == 0 {
            return Err(Error::invalid_config("concurrency", "must be greater than 0"));
        }
        if self.max_pages == 0 {
            return Err(Error::invalid_config("max_pages", "must be greater than 0"));
        }
        if self.session_cookie.is_empty() {
            return Err(Error::invalid_config("session_cookie", "must not be empty"));
        }
        Ok(())
    }

    /// Transport timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Page fetch timeout
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_seconds)
    }

    /// Handshake timeout
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_seconds)
    }

    /// Cookie storage root, defaulting to `~/.linkedin_api/cookies`
    pub fn resolved_storage_root(&self) -> PathBuf {
        if let Some(root) = &self.storage_root {
            return root.clone();
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        home.join(".linkedin_api").join("cookies")
    }

    /// Absolute URL of the login surface
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }

    /// Absolute URL for an API path; absolute URLs pass through
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        join_url(&join_url(&self.base_url, &self.api_prefix), path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the API prefix
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    /// Set the login path
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.config.login_path = path.into();
        self
    }

    /// Set the CSRF scope
    pub fn csrf_scope(mut self, scope: CsrfScope) -> Self {
        self.config.csrf_scope = scope;
        self
    }

    /// Set the default page size
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the concurrency cap
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the page cap
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set all three timeouts in seconds
    pub fn timeouts(mut self, request: u64, page: u64, auth: u64) -> Self {
        self.config.request_timeout_seconds = request;
        self.config.page_timeout_seconds = page;
        self.config.auth_timeout_seconds = auth;
        self
    }

    /// Set the cookie storage root
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = Some(root.into());
        self
    }

    /// Set the rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the caller-side retry policy
    pub fn retry(mut self, backoff: Backoff, retries: u32) -> Self {
        self.config.retry_backoff = backoff;
        self.config.rate_limit_retries = retries;
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
