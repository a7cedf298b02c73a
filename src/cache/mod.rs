//! Full-pipeline result cache.
//!
//! [`CacheStore`] fronts an optional primary backend (Redis) and a local
//! fallback backend (JSON files) behind one interface. Reads and writes try
//! the primary first; any primary error is logged and the call proceeds on
//! the fallback. Cache failures never propagate to the caller: the worst
//! case is a miss, or a report that was not stored.

pub mod entry;
pub mod error;
pub mod file;
pub mod redis;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use entry::{CacheEntry, Rejection};
pub use error::{CacheError, CacheResult};
pub use file::FileBackend;
pub use self::redis::{RedisBackend, RedisSettings};

use crate::config::CacheSettings;
use crate::core::Fingerprint;
use crate::domain::Report;

/// Storage backend for serialized cache envelopes
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Fetch the raw envelope stored under a key
    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>>;

    /// Store a raw envelope. Must be atomic from a reader's point of view.
    async fn put(&self, key: &Fingerprint, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove a key (missing keys are not an error)
    async fn remove(&self, key: &Fingerprint) -> CacheResult<()>;

    /// Remove every key matching a glob over fingerprints, returning the count
    async fn clear(&self, pattern: &str) -> CacheResult<usize>;

    /// Number of stored entries
    async fn entry_count(&self) -> CacheResult<usize>;

    /// Total stored bytes, when the backend can tell
    async fn size_bytes(&self) -> CacheResult<Option<u64>>;

    /// Connectivity check
    async fn ping(&self) -> CacheResult<()>;
}

/// Where a `set` landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWrite {
    Primary,
    Fallback,
    /// Nothing was stored
    Skipped,
}

/// Snapshot of cache health and occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// A primary backend is configured
    pub primary_available: bool,
    /// The primary answered a ping
    pub primary_connected: bool,
    pub primary_entry_count: Option<usize>,
    pub fallback_entry_count: usize,
    pub fallback_size_bytes: u64,
    pub version: String,
}

/// Two-tier cache of assembled reports
pub struct CacheStore {
    primary: Option<Arc<dyn CacheBackend>>,
    fallback: Arc<dyn CacheBackend>,
    version: String,
    ttl: Duration,
}

impl CacheStore {
    /// Create a store from explicit backends
    pub fn new(
        primary: Option<Arc<dyn CacheBackend>>,
        fallback: Arc<dyn CacheBackend>,
        version: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            version: version.into(),
            ttl,
        }
    }

    /// Build the store described by configuration.
    ///
    /// A Redis URL that cannot even be parsed into a pool leaves the store
    /// running on the file backend alone.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        let primary = settings.redis.as_ref().and_then(|redis| {
            match RedisBackend::new(redis.clone()) {
                Ok(backend) => Some(Arc::new(backend) as Arc<dyn CacheBackend>),
                Err(e) => {
                    warn!(error = %e, "Redis backend disabled, using file cache only");
                    None
                }
            }
        });

        let fallback: Arc<dyn CacheBackend> = Arc::new(FileBackend::new(&settings.dir));

        Self::new(primary, fallback, settings.version.clone(), settings.ttl)
    }

    /// Current cache version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Default entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Primary first, then fallback
    fn backends(&self) -> impl Iterator<Item = &Arc<dyn CacheBackend>> {
        self.primary.iter().chain(std::iter::once(&self.fallback))
    }

    /// Look up a report.
    ///
    /// Invalid entries (corrupt, stale version, wrong key, expired) count as
    /// misses and are removed on a best-effort basis.
    pub async fn get(&self, key: &Fingerprint) -> Option<Report> {
        if key.version() != self.version {
            debug!(fingerprint = %key.short(), version = key.version(), "Version mismatch, skipping lookup");
            return None;
        }

        let started = Instant::now();

        for backend in self.backends() {
            let raw = match backend.get(key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Cache read failed, trying next backend");
                    continue;
                }
            };

            match CacheEntry::decode(&raw, key, &self.version, Utc::now()) {
                Ok(entry) => {
                    info!(
                        backend = backend.name(),
                        fingerprint = %key.short(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Cache hit"
                    );
                    return Some(entry.payload);
                }
                Err(rejection) => {
                    info!(backend = backend.name(), fingerprint = %key.short(), reason = %rejection, "Discarding cache entry");
                    if let Err(e) = backend.remove(key).await {
                        warn!(backend = backend.name(), error = %e, "Failed to remove invalid cache entry");
                    }
                }
            }
        }

        info!(fingerprint = %key.short(), "Cache miss");
        None
    }

    /// Store a report. Never fails; the outcome says where it landed.
    pub async fn set(&self, key: &Fingerprint, report: &Report, ttl: Duration) -> CacheWrite {
        if key.version() != self.version {
            warn!(fingerprint = %key.short(), version = key.version(), "Refusing to cache under a foreign version");
            return CacheWrite::Skipped;
        }

        let entry = CacheEntry::new(key, &self.version, ttl.as_secs(), report.clone());
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cache entry");
                return CacheWrite::Skipped;
            }
        };

        if let Some(primary) = &self.primary {
            match primary.put(key, &raw, ttl).await {
                Ok(()) => {
                    info!(backend = primary.name(), fingerprint = %key.short(), ttl_secs = ttl.as_secs(), "Cached report");
                    return CacheWrite::Primary;
                }
                Err(e) => {
                    warn!(backend = primary.name(), error = %e, "Cache write failed, using fallback");
                }
            }
        }

        match self.fallback.put(key, &raw, ttl).await {
            Ok(()) => {
                info!(backend = self.fallback.name(), fingerprint = %key.short(), ttl_secs = ttl.as_secs(), "Cached report");
                CacheWrite::Fallback
            }
            Err(e) => {
                warn!(backend = self.fallback.name(), error = %e, "Cache write failed, report not cached");
                CacheWrite::Skipped
            }
        }
    }

    /// Remove entries whose fingerprint matches `pattern`; `None` clears all
    pub async fn clear(&self, pattern: Option<&str>) -> usize {
        let pattern = pattern.unwrap_or("*");
        let mut removed = 0;

        for backend in self.backends() {
            match backend.clear(pattern).await {
                Ok(count) => {
                    info!(backend = backend.name(), pattern, count, "Cleared cache entries");
                    removed += count;
                }
                Err(e) => warn!(backend = backend.name(), error = %e, "Cache clear failed"),
            }
        }

        removed
    }

    /// Report availability and occupancy of both backends
    pub async fn stats(&self) -> CacheStats {
        let (primary_connected, primary_entry_count) = match &self.primary {
            Some(primary) => match primary.ping().await {
                Ok(()) => (true, primary.entry_count().await.ok()),
                Err(e) => {
                    debug!(error = %e, "Primary cache unreachable");
                    (false, None)
                }
            },
            None => (false, None),
        };

        let fallback_entry_count = self.fallback.entry_count().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count fallback cache entries");
            0
        });
        let fallback_size_bytes = self
            .fallback
            .size_bytes()
            .await
            .ok()
            .flatten()
            .unwrap_or(0);

        CacheStats {
            primary_available: self.primary.is_some(),
            primary_connected,
            primary_entry_count,
            fallback_entry_count,
            fallback_size_bytes,
            version: self.version.clone(),
        }
    }
}
