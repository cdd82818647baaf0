//! Cookie types
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cookie issued by the upstream host
///
/// Identity is `(name, domain, path)`. The value is redacted in `Debug`
/// output so a logged session never leaks its credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to
    pub domain: String,
    /// URL path scope
    pub path: String,
    /// Expiry instant, `None` for cookies that never expire
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Only sent over HTTPS
    #[serde(default)]
    pub secure: bool,
}

impl Cookie {
    /// Create a non-expiring, non-secure cookie
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
            expires_at: None,
            secure: false,
        }
    }

    /// Set the expiry instant
    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Mark the cookie secure
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Whether two cookies share `(name, domain, path)`
    pub fn same_identity(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Expired strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires_at", &self.expires_at)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Strip one pair of surrounding double quotes
pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Ordered set of cookies keyed by identity
///
/// Insertion order is preserved; inserting a cookie whose identity already
/// exists replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSet {
    cookies: Vec<Cookie>,
}

impl CookieSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie
    pub fn insert(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.same_identity(&cookie)) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Merge another set into this one, newer cookies winning
    pub fn merge(&mut self, other: impl IntoIterator<Item = Cookie>) {
        for cookie in other {
            self.insert(cookie);
        }
    }

    /// First cookie with the given name
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Value of the session-identifying cookie with quotes stripped
    pub fn session_token(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|c| strip_quotes(&c.value).to_string())
            .filter(|v| !v.is_empty())
    }

    /// Render as a `Cookie` request header value
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.cookies.iter()
    }

    /// Number of cookies
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl FromIterator<Cookie> for CookieSet {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        let mut set = CookieSet::new();
        set.merge(iter);
        set
    }
}

impl IntoIterator for CookieSet {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.into_iter()
    }
}

impl<'a> IntoIterator for &'a CookieSet {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.iter()
    }
}
