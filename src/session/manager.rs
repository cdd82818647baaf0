//! Session manager implementation
//!
//! Handles the login handshake, authorized requests, and single-flight
//! re-authentication.

use super::state::AuthState;
use crate::config::ClientConfig;
use crate::cookies::{CookieSet, CookieStore};
use crate::error::{Error, Result};
use crate::http::{HttpTransport, RequestBody, Transport, TransportRequest, TransportResponse};
use crate::types::Method;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// `login_result` value of a successful credential submission
pub const LOGIN_RESULT_PASS: &str = "PASS";

/// `login_result` value when the server wants out-of-band verification
pub const LOGIN_RESULT_CHALLENGE: &str = "CHALLENGE";

/// Retry-after used when a 429 carries no usable hint
const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    login_result: Option<String>,
}

/// Mutable session state, guarded by the manager's lock
#[derive(Debug, Default)]
struct SessionInner {
    state: AuthState,
    user_id: Option<String>,
    cookies: CookieSet,
    csrf_token: Option<String>,
    credentials: Option<Credentials>,
    /// Bumped every time a handshake or restore completes
    epoch: u64,
    /// Outcome of the most recent handshake when it failed
    last_failure: Option<Error>,
}

impl SessionInner {
    fn set_state(&mut self, next: AuthState) -> Result<()> {
        let previous = self.state;
        self.state = previous.transition(next)?;
        debug!(from = %previous, to = %next, user_id = ?self.user_id, "session state changed");
        Ok(())
    }

    /// Back to `Unauthenticated` from any settled state
    fn reset(&mut self) -> Result<()> {
        if self.state != AuthState::Unauthenticated {
            self.set_state(AuthState::Unauthenticated)?;
        }
        self.cookies = CookieSet::new();
        self.csrf_token = None;
        Ok(())
    }

    fn user(&self) -> String {
        self.user_id.clone().unwrap_or_default()
    }
}

/// Owns one authenticated session
///
/// Cookie set and anti-forgery token are shared by every request issued
/// through the manager. Handshakes (login, restore, re-authentication) are
/// serialized by a dedicated lock; requests only take the state lock briefly
/// to snapshot cookies and token.
pub struct SessionManager {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: CookieStore,
    inner: RwLock<SessionInner>,
    handshake: Mutex<()>,
}

impl SessionManager {
    /// Create a manager from its collaborators
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, store: CookieStore) -> Self {
        Self {
            config,
            transport,
            store,
            inner: RwLock::new(SessionInner::default()),
            handshake: Mutex::new(()),
        }
    }

    /// Create a manager with the reqwest transport and file cookie store
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        let store = CookieStore::new(config.resolved_storage_root())
            .with_session_cookie(config.session_cookie.clone());
        Ok(Self::new(config, transport, store))
    }

    /// Get the client config
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the cookie store
    pub fn store(&self) -> &CookieStore {
        &self.store
    }

    /// Current state
    pub async fn state(&self) -> AuthState {
        self.inner.read().await.state
    }

    /// User the session belongs to
    pub async fn user_id(&self) -> Option<String> {
        self.inner.read().await.user_id.clone()
    }

    /// Current anti-forgery token
    pub async fn csrf_token(&self) -> Option<String> {
        self.inner.read().await.csrf_token.clone()
    }

    /// Snapshot of the live cookie set
    pub async fn cookies(&self) -> CookieSet {
        self.inner.read().await.cookies.clone()
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Run the full login handshake
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        let _guard = self.handshake.lock().await;
        self.run_handshake(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    /// Load stored cookies for `user_id` and become `Authenticated` without
    /// submitting credentials
    ///
    /// Returns `Ok(false)` when nothing usable is stored.
    pub async fn restore_session(&self, user_id: &str) -> Result<bool> {
        let _guard = self.handshake.lock().await;

        let cookies = self.store.get(user_id).await?;
        let Some(token) = cookies.session_token(&self.config.session_cookie) else {
            debug!(user_id, stored = cookies.len(), "no stored session to restore");
            return Ok(false);
        };

        let mut inner = self.inner.write().await;
        inner.reset()?;
        // Credentials of another account must never re-authenticate this one
        if inner
            .credentials
            .as_ref()
            .is_some_and(|c| c.username != user_id)
        {
            inner.credentials = None;
        }
        inner.user_id = Some(user_id.to_string());
        inner.cookies = cookies;
        inner.csrf_token = Some(token);
        inner.set_state(AuthState::Authenticated)?;
        inner.epoch += 1;
        inner.last_failure = None;

        info!(user_id, "restored session from cookie store");
        Ok(true)
    }

    /// Restore a stored session, falling back to the handshake when nothing
    /// is stored or the stored session expired
    ///
    /// The credentials are remembered for later re-authentication either way.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        match self.restore_session(username).await {
            Ok(true) => {
                self.inner.write().await.credentials = Some(Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                });
                Ok(())
            }
            Ok(false) => self.authenticate(username, password).await,
            Err(Error::SessionExpired { .. }) => {
                info!(user_id = username, "stored session expired, authenticating");
                self.authenticate(username, password).await
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the live session
    pub async fn invalidate(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.state.is_handshaking() {
            return Err(Error::InvalidStateTransition {
                from: inner.state.to_string(),
                to: AuthState::Unauthenticated.to_string(),
            });
        }
        inner.reset()
    }

    /// Drop the live session and delete its stored cookies
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.handshake.lock().await;
        let user_id = self.inner.read().await.user_id.clone();
        self.invalidate().await?;
        self.inner.write().await.credentials = None;
        if let Some(user_id) = user_id {
            self.store.delete(&user_id).await?;
        }
        Ok(())
    }

    /// Handshake with the timeout applied; caller holds the handshake lock
    async fn run_handshake(&self, credentials: Credentials) -> Result<()> {
        let username = credentials.username.clone();
        {
            let mut inner = self.inner.write().await;
            inner.reset()?;
            inner.user_id = Some(username.clone());
            inner.credentials = Some(credentials.clone());
        }

        let timeout = self.config.auth_timeout();
        let result = match tokio::time::timeout(timeout, self.handshake_steps(&credentials)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        let mut inner = self.inner.write().await;
        inner.epoch += 1;
        match &result {
            Ok(()) => {
                inner.last_failure = None;
                info!(user_id = %username, "authenticated");
            }
            Err(e) => {
                if inner.state.is_handshaking() {
                    inner.set_state(AuthState::Failed)?;
                }
                inner.last_failure = Some(e.share(&username));
                warn!(user_id = %username, error = %e, "authentication failed");
            }
        }
        result
    }

    async fn handshake_steps(&self, credentials: &Credentials) -> Result<()> {
        let username = credentials.username.as_str();
        let login_url = self.config.login_url();

        // Step 1: unauthenticated visit to the login surface for the session cookie
        self.inner
            .write()
            .await
            .set_state(AuthState::AwaitingCsrf)?;

        let response = self
            .transport
            .issue(
                TransportRequest::new(Method::GET, &login_url)
                    .headers(&self.config.auth_headers)
                    .timeout(self.config.request_timeout()),
            )
            .await?;
        check_throttled(&response)?;

        let mut cookies: CookieSet = response.cookies.into_iter().collect();
        let token = cookies
            .session_token(&self.config.session_cookie)
            .ok_or_else(|| Error::CsrfTokenMissing {
                user_id: username.to_string(),
                status: response.status,
            })?;

        // Step 2: submit credentials with the token and the step-1 cookies
        self.inner
            .write()
            .await
            .set_state(AuthState::SubmittingCredentials)?;

        let form = vec![
            ("session_key".to_string(), credentials.username.clone()),
            ("session_password".to_string(), credentials.password.clone()),
            (self.config.session_cookie.clone(), token.clone()),
        ];
        let response = self
            .transport
            .issue(
                TransportRequest::new(Method::POST, &login_url)
                    .headers(&self.config.auth_headers)
                    .body(Some(RequestBody::Form(form)))
                    .cookies(cookies.clone())
                    .timeout(self.config.request_timeout()),
            )
            .await?;
        check_throttled(&response)?;
        cookies.merge(response.cookies.iter().cloned());

        // Step 3: interpret the verdict
        let verdict = response
            .json::<LoginResponse>()
            .ok()
            .and_then(|r| r.login_result);

        match verdict.as_deref() {
            Some(LOGIN_RESULT_PASS) => {
                let token = cookies
                    .session_token(&self.config.session_cookie)
                    .unwrap_or(token);

                if let Err(e) = self.store.save(&cookies, username).await {
                    warn!(user_id = username, error = %e, "failed to persist session cookies");
                }

                let mut inner = self.inner.write().await;
                inner.cookies = cookies;
                inner.csrf_token = Some(token);
                inner.set_state(AuthState::Authenticated)?;
                Ok(())
            }
            Some(LOGIN_RESULT_CHALLENGE) => Err(Error::ChallengePending {
                user_id: username.to_string(),
            }),
            Some(other) => Err(Error::auth_failed(username, Some(response.status), other)),
            None => Err(Error::auth_failed(
                username,
                Some(response.status),
                "unrecognized login response",
            )),
        }
    }

    // ========================================================================
    // Authorized requests
    // ========================================================================

    /// Issue a request with the session's cookies and, where the CSRF scope
    /// applies, the anti-forgery token
    ///
    /// A 401 drops the session to `Unauthenticated` and surfaces
    /// `SessionExpired`; a 429 surfaces `RateLimited`.
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<TransportResponse> {
        let (request, epoch, user_id) = {
            let inner = self.inner.read().await;
            if !inner.state.is_authenticated() {
                return Err(Error::NotAuthenticated {
                    state: inner.state.to_string(),
                });
            }

            let mut request = TransportRequest::new(method, self.config.api_url(path))
                .headers(&self.config.default_headers)
                .body(body)
                .cookies(inner.cookies.clone())
                .timeout(self.config.request_timeout());
            if self.config.csrf_scope.applies_to(method) {
                if let Some(token) = &inner.csrf_token {
                    request = request.header(self.config.csrf_header.clone(), token.clone());
                }
            }
            (request, inner.epoch, inner.user())
        };

        let response = self.transport.issue(request).await?;

        match response.status {
            401 => {
                self.expire(epoch).await;
                Err(Error::session_expired(user_id))
            }
            429 => Err(Error::RateLimited {
                retry_after_seconds: response
                    .retry_after()
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS),
            }),
            status if !response.is_success() => Err(Error::http_status(status, response.text())),
            _ => {
                if !response.cookies.is_empty() {
                    self.absorb_cookies(epoch, &response).await;
                }
                Ok(response)
            }
        }
    }

    /// `authorized_request`, re-authenticating once with the remembered
    /// credentials when the session turns out to be expired
    ///
    /// Concurrent callers that observe the same expiry share one handshake.
    pub async fn request_with_reauth(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
    ) -> Result<TransportResponse> {
        let epoch = self.inner.read().await.epoch;

        match self.authorized_request(method, path, body.clone()).await {
            Err(e @ (Error::SessionExpired { .. } | Error::NotAuthenticated { .. })) => {
                if !self.reauthenticate(epoch).await? {
                    return Err(e);
                }
                self.authorized_request(method, path, body).await
            }
            other => other,
        }
    }

    /// Single-flight re-authentication
    ///
    /// `seen_epoch` is the epoch the caller's failed request ran under. If a
    /// handshake finished since then, its outcome is adopted instead of
    /// starting another one. Returns `false` when no credentials are known.
    async fn reauthenticate(&self, seen_epoch: u64) -> Result<bool> {
        let _guard = self.handshake.lock().await;

        let credentials = {
            let inner = self.inner.read().await;
            if inner.epoch != seen_epoch {
                if inner.state.is_authenticated() {
                    debug!(user_id = ?inner.user_id, "re-authentication already done by another caller");
                    return Ok(true);
                }
                if let Some(failure) = &inner.last_failure {
                    return Err(failure.share(&inner.user()));
                }
            }
            match &inner.credentials {
                Some(credentials) => credentials.clone(),
                None => return Ok(false),
            }
        };

        info!(user_id = %credentials.username, "re-authenticating expired session");
        self.run_handshake(credentials).await?;
        Ok(true)
    }

    /// Mark the session expired unless a newer handshake already replaced it
    async fn expire(&self, epoch: u64) {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch || !inner.state.is_authenticated() {
            return;
        }
        if let Err(e) = inner.set_state(AuthState::Unauthenticated) {
            warn!(error = %e, "failed to expire session");
            return;
        }
        warn!(user_id = ?inner.user_id, "session rejected by server");
    }

    /// Fold response cookies into the live set
    async fn absorb_cookies(&self, epoch: u64, response: &TransportResponse) {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch || !inner.state.is_authenticated() {
            return;
        }
        inner.cookies.merge(response.cookies.iter().cloned());
        if let Some(token) = inner.cookies.session_token(&self.config.session_cookie) {
            inner.csrf_token = Some(token);
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.config.base_url)
            .field("store", &self.store.root())
            .finish_non_exhaustive()
    }
}

fn check_throttled(response: &TransportResponse) -> Result<()> {
    if response.status == 429 {
        return Err(Error::RateLimited {
            retry_after_seconds: response
                .retry_after()
                .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS),
        });
    }
    Ok(())
}
