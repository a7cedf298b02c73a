//! Versioned request fingerprints.
//!
//! A fingerprint is `{version}:{sha256 hex}` over the canonical JSON
//! serialization of a [`RequestRecord`]. The record is first converted to a
//! `serde_json::Value`, whose object maps are ordered by key, so the
//! serialized form is compact, sorted and stable across runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::RequestRecord;

/// Cache key for a normalized request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a record under a cache version
    pub fn of(record: &RequestRecord, version: &str) -> Self {
        let canonical = canonical_json(record);
        let digest = hash_canonical(&canonical);
        Self(format!("{}:{}", version, digest))
    }

    /// Wrap an existing key string (e.g. read back from storage)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Version prefix (everything before the first `:`)
    pub fn version(&self) -> &str {
        self.0.split_once(':').map(|(v, _)| v).unwrap_or("")
    }

    /// Hex digest part
    pub fn digest(&self) -> &str {
        self.0.split_once(':').map(|(_, d)| d).unwrap_or(&self.0)
    }

    /// First 16 hex chars of the digest, for logs
    pub fn short(&self) -> &str {
        let digest = self.digest();
        digest.get(..16).unwrap_or(digest)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a record under a cache version
pub fn fingerprint(record: &RequestRecord, version: &str) -> Fingerprint {
    Fingerprint::of(record, version)
}

/// Canonical serialization: compact JSON with sorted keys
pub fn canonical_json(record: &RequestRecord) -> String {
    // Value maps are BTreeMap-backed without the preserve_order feature,
    // which sorts keys regardless of struct field order.
    serde_json::to_value(record)
        .and_then(|value| serde_json::to_string(&value))
        .unwrap_or_default()
}

fn hash_canonical(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::normalize;
    use serde_json::json;

    #[test]
    fn test_fingerprint_format() {
        let record = normalize(&json!({"startupName": "Acme"}));
        let fp = fingerprint(&record, "v1");

        assert!(fp.as_str().starts_with("v1:"));
        assert_eq!(fp.version(), "v1");
        assert_eq!(fp.digest().len(), 64);
        assert!(fp.digest().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 16);
    }

    #[test]
    fn test_canonical_keys_sorted() {
        let canonical = canonical_json(&RequestRecord::default());
        let value: serde_json::Value = serde_json::from_str(&canonical).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(!canonical.contains(": "));
    }

    #[test]
    fn test_version_changes_fingerprint() {
        let record = normalize(&json!({"startupName": "Acme"}));
        let v1 = fingerprint(&record, "v1");
        let v2 = fingerprint(&record, "v2");

        assert_ne!(v1, v2);
        assert_eq!(v1.digest(), v2.digest());
    }
}
