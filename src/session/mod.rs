//! Session module
//!
//! Owns one authenticated session against the upstream host.
//!
//! The `SessionManager` drives the login handshake, derives the anti-forgery
//! token from the session cookie, attaches cookies and token to authorized
//! requests, and serializes re-authentication so concurrent callers that
//! observe an expired session share a single handshake.

mod manager;
mod state;

pub use manager::{SessionManager, LOGIN_RESULT_CHALLENGE, LOGIN_RESULT_PASS};
pub use state::AuthState;
