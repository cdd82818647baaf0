//! Cookie store implementation
//!
//! Provides per-user file persistence with atomic writes.

use super::types::CookieSet;
use crate::clock::{system_clock, SharedClock};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Default name of the session-identifying cookie
pub const DEFAULT_SESSION_COOKIE: &str = "JSESSIONID";

/// Distinguishes temp files of concurrent writers within one process
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk record for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSessionRecord {
    /// User the cookies belong to
    pub user_id: String,
    /// When the record was written
    pub saved_at: DateTime<Utc>,
    /// The full cookie set
    pub cookies: CookieSet,
}

/// Durable per-user cookie persistence
#[derive(Debug, Clone)]
pub struct CookieStore {
    /// Directory holding one record per user
    root: PathBuf,
    /// Name of the cookie whose expiry invalidates the whole record
    session_cookie: String,
    /// Time source for expiry checks
    clock: SharedClock,
}

impl CookieStore {
    /// Create a store rooted at `root` using the system clock
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            clock: system_clock(),
        }
    }

    /// Use a different session-identifying cookie name
    #[must_use]
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    /// Use a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Get the storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `user_id`
    pub fn record_path(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty() {
            return Err(Error::storage("user id must not be empty"));
        }
        let encoded: String = url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect();
        Ok(self.root.join(format!("{encoded}.json")))
    }

    /// Whether a record exists for `user_id`
    pub async fn exists(&self, user_id: &str) -> Result<bool> {
        let path = self.record_path(user_id)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Persist the full cookie set for `user_id`, replacing any previous record
    pub async fn save(&self, cookies: &CookieSet, user_id: &str) -> Result<()> {
        let path = self.record_path(user_id)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::storage(format!("Failed to create cookie directory: {e}")))?;

        let record = StoredSessionRecord {
            user_id: user_id.to_string(),
            saved_at: self.clock.now(),
            cookies: cookies.clone(),
        };
        let contents = serde_json::to_string_pretty(&record)
            .map_err(|e| Error::storage(format!("Failed to serialize cookies: {e}")))?;

        // Write to a temp file first, then rename for atomicity
        let temp_path = self.temp_path(&path);
        if let Err(e) = tokio::fs::write(&temp_path, &contents).await {
            return Err(Error::storage(format!("Failed to write cookie file: {e}")));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp cookie file");
            }
            return Err(Error::storage(format!("Failed to rename cookie file: {e}")));
        }

        debug!(user_id, cookies = cookies.len(), path = %path.display(), "saved cookies");
        Ok(())
    }

    /// Load the cookie set for `user_id`
    ///
    /// A missing record yields an empty set. A record whose session cookie
    /// expired before now fails with `SessionExpired`.
    pub async fn get(&self, user_id: &str) -> Result<CookieSet> {
        let Some(record) = self.load_record(user_id).await? else {
            debug!(user_id, "no stored cookies");
            return Ok(CookieSet::new());
        };

        let now = self.clock.now();
        for cookie in &record.cookies {
            if cookie.name == self.session_cookie && cookie.is_expired_at(now) {
                debug!(user_id, expires_at = ?cookie.expires_at, "stored session expired");
                return Err(Error::session_expired(user_id));
            }
        }

        Ok(record.cookies)
    }

    /// Read the raw record without expiry checks
    pub async fn load_record(&self, user_id: &str) -> Result<Option<StoredSessionRecord>> {
        let path = self.record_path(user_id)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(format!("Failed to read cookie file: {e}"))),
        };

        let record: StoredSessionRecord = serde_json::from_str(&contents)
            .map_err(|e| Error::storage(format!("Failed to parse cookie file: {e}")))?;
        Ok(Some(record))
    }

    /// Remove the record for `user_id`; missing records are not an error
    pub async fn delete(&self, user_id: &str) -> Result<()> {
        let path = self.record_path(user_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(user_id, "deleted stored cookies");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(format!("Failed to delete cookie file: {e}"))),
        }
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.{n}.tmp", std::process::id()));
        path.with_file_name(name)
    }
}
