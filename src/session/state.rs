//! Authentication state machine

use crate::error::{Error, Result};
use std::fmt;

/// Where a session is in its login lifecycle
///
/// ```text
/// Unauthenticated ──► AwaitingCsrf ──► SubmittingCredentials ──► Authenticated
/// Unauthenticated ──────────────── (restore) ──────────────────► Authenticated
/// AwaitingCsrf | SubmittingCredentials ──► Failed
/// Authenticated | Failed ──► Unauthenticated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No usable session
    #[default]
    Unauthenticated,
    /// Login surface requested, waiting for the session cookie
    AwaitingCsrf,
    /// Credentials posted, waiting for the verdict
    SubmittingCredentials,
    /// Cookies and token are usable
    Authenticated,
    /// The last handshake failed
    Failed,
}

impl AuthState {
    /// Whether moving to `next` is allowed
    pub fn can_transition_to(self, next: AuthState) -> bool {
        use AuthState::{AwaitingCsrf, Authenticated, Failed, SubmittingCredentials, Unauthenticated};

        matches!(
            (self, next),
            (Unauthenticated, AwaitingCsrf | Authenticated)
                | (AwaitingCsrf, SubmittingCredentials | Failed)
                | (SubmittingCredentials, Authenticated | Failed)
                | (Authenticated | Failed, Unauthenticated)
        )
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(self, next: AuthState) -> Result<AuthState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Authorized requests are only possible here
    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }

    /// A handshake is in progress
    pub fn is_handshaking(self) -> bool {
        matches!(self, AuthState::AwaitingCsrf | AuthState::SubmittingCredentials)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::AwaitingCsrf => "awaiting_csrf",
            AuthState::SubmittingCredentials => "submitting_credentials",
            AuthState::Authenticated => "authenticated",
            AuthState::Failed => "failed",
        };
        f.write_str(s)
    }
}
