// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Voyager Session
//!
//! Cookie-backed session management and ordered pagination for LinkedIn's
//! private Voyager API.
//!
//! ## Features
//!
//! - **Login handshake**: session cookie, anti-forgery token, credential
//!   submission, challenge detection
//! - **Cookie persistence**: one JSON record per account, atomic replace,
//!   expiry checked against an injectable clock
//! - **Authorized requests**: cookies and token attached, expiry detected,
//!   single-flight re-authentication for concurrent callers
//! - **Pagination**: bounded-concurrency page fetches merged in cursor order,
//!   partial results when a later page fails
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voyager_session::{ClientConfig, PaginationEngine, RemoteCollection, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> voyager_session::Result<()> {
//!     let config = ClientConfig::default();
//!     let session = SessionManager::from_config(config)?;
//!     session.login("alice@example.com", "hunter2").await?;
//!
//!     let engine = PaginationEngine::new(session.config().into());
//!     let connections = RemoteCollection::new(&session, "/relationships/connections")
//!         .collect(&engine, 10, Some(25))
//!         .await?;
//!     println!("{} connections", connections.fetched_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │        PaginationEngine  ◄──  RemoteCollection (page fetch)    │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ request_with_reauth
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │ SessionManager  (AuthState, cookies, csrf token, single-flight)│
//! └──────────────┬───────────────────────────────┬───────────────┘
//!                │                               │
//!        ┌───────┴────────┐              ┌───────┴────────┐
//!        │ Transport      │              │ CookieStore    │
//!        │ (reqwest)      │              │ (JSON files)   │
//!        └────────────────┘              └────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Injectable wall clock
pub mod clock;

/// Client configuration
pub mod config;

/// Cookies and the per-account cookie store
pub mod cookies;

/// Request transport, pacing and caller-side retry
pub mod http;

/// Login handshake and authorized requests
pub mod session;

/// Ordered collection fetching
pub mod pagination;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::ClientConfig;
pub use cookies::{Cookie, CookieSet, CookieStore};
pub use pagination::{AggregatedCollection, CollectionError, PaginationEngine, RemoteCollection};
pub use session::{AuthState, SessionManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
