//! Cache entry envelope.
//!
//! Both backends store the same JSON envelope. The primary also has native
//! TTL, but the envelope lets every read be validated the same way.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Fingerprint;
use crate::domain::Report;

/// Upper bound on stored lifetimes (ten years)
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

/// Clock skew tolerated on `stored_at` before an entry counts as corrupt
const MAX_FUTURE_SKEW_SECONDS: i64 = 300;

/// A stored report with its provenance and lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key this entry was written under
    pub fingerprint: String,

    /// Cache version at write time
    pub version: String,

    /// When the entry was written
    pub stored_at: DateTime<Utc>,

    /// Lifetime from `stored_at`
    pub ttl_seconds: u64,

    /// The cached report
    pub payload: Report,
}

/// Why a stored entry was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("corrupt entry: {0}")]
    Corrupt(String),

    #[error("stale version {stored}")]
    VersionMismatch { stored: String },

    #[error("entry belongs to {stored}")]
    FingerprintMismatch { stored: String },

    #[error("expired")]
    Expired,
}

impl CacheEntry {
    pub fn new(fingerprint: &Fingerprint, version: &str, ttl_seconds: u64, payload: Report) -> Self {
        Self {
            fingerprint: fingerprint.as_str().to_string(),
            version: version.to_string(),
            stored_at: Utc::now(),
            ttl_seconds,
            payload,
        }
    }

    /// `None` when `stored_at + ttl` falls outside the representable range
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = self.ttl_seconds.min(MAX_TTL_SECONDS) as i64;
        self.stored_at.checked_add_signed(ChronoDuration::seconds(ttl))
    }

    /// Check the entry's lifetime against `now`.
    ///
    /// A `stored_at` beyond the tolerated skew into the future, or one whose
    /// expiry overflows, is corrupt rather than long-lived.
    pub fn check_lifetime(&self, now: DateTime<Utc>) -> Result<(), Rejection> {
        let latest_write = now + ChronoDuration::seconds(MAX_FUTURE_SKEW_SECONDS);
        if self.stored_at > latest_write {
            return Err(Rejection::Corrupt(format!(
                "stored_at {} is in the future",
                self.stored_at
            )));
        }

        match self.expires_at() {
            Some(expires_at) if now < expires_at => Ok(()),
            Some(_) => Err(Rejection::Expired),
            None => Err(Rejection::Corrupt("expiry out of range".to_string())),
        }
    }

    /// Parse a stored envelope and check it against the requested key
    pub fn decode(
        raw: &str,
        fingerprint: &Fingerprint,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, Rejection> {
        let entry: CacheEntry =
            serde_json::from_str(raw).map_err(|e| Rejection::Corrupt(e.to_string()))?;

        if entry.version != version {
            return Err(Rejection::VersionMismatch {
                stored: entry.version,
            });
        }
        if entry.fingerprint != fingerprint.as_str() {
            return Err(Rejection::FingerprintMismatch {
                stored: entry.fingerprint,
            });
        }
        entry.check_lifetime(now)?;

        Ok(entry)
    }
}
