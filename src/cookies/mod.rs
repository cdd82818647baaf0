//! Cookie module
//!
//! Holds the session's cookie set and persists it per user.
//!
//! # Overview
//!
//! The cookie module provides:
//! - `Cookie` / `CookieSet` - the cookies issued by the upstream host
//! - `CookieStore` - one JSON record per user, replaced atomically on save
//! - Expiry detection for the session-identifying cookie

mod store;
mod types;

pub use store::{CookieStore, StoredSessionRecord, DEFAULT_SESSION_COOKIE};
pub use types::{strip_quotes, Cookie, CookieSet};

#[cfg(test)]
mod tests;
