//! Edge-visible "a session exists" marker.
//!
//! The signal lets a perimeter guard that cannot read the credential store
//! decide whether to let navigation through to protected views. It carries
//! no secret and proves nothing: it is an optimistic UX gate only. Real
//! authorization is always the backend rejecting a bad bearer token, which
//! the request pipeline turns into a refresh or a forced login.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::{read_json, remove_if_exists, write_json_atomic};

/// Marker file name in the state directory
const SIGNAL_FILE: &str = "auth-session";

/// Lifetime of the marker, independent of the access token expiry.
pub const SIGNAL_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Marker {
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Marker {
    fn is_live(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

enum Backing {
    Memory(RwLock<Option<Marker>>),
    File(PathBuf),
}

pub struct SessionSignal {
    backing: Backing,
    ttl: Duration,
}

impl SessionSignal {
    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory(RwLock::new(None)),
            ttl: Duration::days(SIGNAL_TTL_DAYS),
        }
    }

    /// A signal stored as `<state_dir>/auth-session`, so other processes
    /// (the perimeter guard) can observe it.
    pub fn at(state_dir: &Path) -> Self {
        Self {
            backing: Backing::File(state_dir.join(SIGNAL_FILE)),
            ttl: Duration::days(SIGNAL_TTL_DAYS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mark a session as present for the next `ttl`.
    pub fn set(&self) -> Result<()> {
        let now = Utc::now();
        let marker = Marker {
            issued_at: now,
            expires_at: now + self.ttl,
        };
        match &self.backing {
            Backing::Memory(slot) => {
                *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(marker);
                Ok(())
            }
            Backing::File(path) => write_json_atomic(path, &marker),
        }
    }

    pub fn clear(&self) -> Result<()> {
        match &self.backing {
            Backing::Memory(slot) => {
                *slot.write().unwrap_or_else(PoisonError::into_inner) = None;
                Ok(())
            }
            Backing::File(path) => remove_if_exists(path),
        }
    }

    /// True when set and not past its own TTL.
    pub fn is_present(&self) -> bool {
        self.marker().map(|m| m.is_live()).unwrap_or(false)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.marker().filter(|m| m.is_live()).map(|m| m.expires_at)
    }

    /// Read the signal straight from a state directory, the way a guard
    /// running outside this process would.
    pub fn probe(state_dir: &Path) -> bool {
        Self::at(state_dir).is_present()
    }

    fn marker(&self) -> Option<Marker> {
        match &self.backing {
            Backing::Memory(slot) => *slot.read().unwrap_or_else(PoisonError::into_inner),
            Backing::File(path) => match read_json::<Marker>(path) {
                Ok(marker) => marker,
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable session signal");
                    None
                }
            },
        }
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::in_memory()
    }
}
