use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::Account;
use crate::utils::{read_json, remove_if_exists, write_json_atomic};

/// Session file name in the state directory
const SESSION_FILE: &str = "session.json";

/// Seconds before `expires_at` at which a token already counts as expired,
/// so a request started just before expiry does not fail mid-flight.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// The stored session: both tokens, their expiry, and the account profile.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

impl SessionRecord {
    /// Build a record whose expiry is `expires_in` seconds from now.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
        account: Account,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            account,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

impl fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("account", &self.account.id)
            .finish()
    }
}

/// Synchronous, process-wide storage for the single [`SessionRecord`].
///
/// The in-memory copy is authoritative for the running process. When a
/// state directory is configured every mutation is also written through to
/// `session.json`; disk failures are logged rather than surfaced, since the
/// session is still usable until the process exits.
pub struct CredentialStore {
    path: Option<PathBuf>,
    record: RwLock<Option<SessionRecord>>,
}

impl CredentialStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            record: RwLock::new(None),
        }
    }

    /// A store backed by `<state_dir>/session.json`, restoring any record
    /// already on disk. A corrupt file is treated as no session.
    pub fn load(state_dir: &Path) -> Self {
        let path = state_dir.join(SESSION_FILE);
        let record = match read_json::<SessionRecord>(&path) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session file");
                None
            }
        };
        debug!(has_session = record.is_some(), "Session loaded");

        Self {
            path: Some(path),
            record: RwLock::new(record),
        }
    }

    pub fn read(&self) -> Option<SessionRecord> {
        self.read_guard().clone()
    }

    /// Replace the whole record.
    pub fn write(&self, record: SessionRecord) {
        let mut guard = self.write_guard();
        self.persist(Some(&record));
        *guard = Some(record);
    }

    /// Swap in refreshed tokens, keeping the account profile untouched.
    ///
    /// Returns `false` without writing anything when there is no record to
    /// update; tokens are never stored without their account.
    pub fn write_refreshed(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> bool {
        let mut guard = self.write_guard();
        let Some(current) = guard.as_ref() else {
            warn!("Refreshed tokens arrived after the session was cleared; dropping them");
            return false;
        };

        let updated = SessionRecord::new(
            access_token,
            refresh_token,
            expires_in,
            current.account.clone(),
        );
        self.persist(Some(&updated));
        *guard = Some(updated);
        true
    }

    pub fn clear(&self) {
        let mut guard = self.write_guard();
        self.persist(None);
        *guard = None;
    }

    /// True if there is no record or the access token is inside the expiry margin.
    pub fn is_expired(&self) -> bool {
        self.read_guard()
            .as_ref()
            .map(|r| r.is_expired())
            .unwrap_or(true)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_expired()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_guard().as_ref().map(|r| r.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_guard()
            .as_ref()
            .map(|r| r.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn account(&self) -> Option<Account> {
        self.read_guard().as_ref().map(|r| r.account.clone())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, record: Option<&SessionRecord>) {
        let Some(ref path) = self.path else {
            return;
        };
        let result = match record {
            Some(record) => write_json_atomic(path, record),
            None => remove_if_exists(path),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Option<SessionRecord>> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Option<SessionRecord>> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
