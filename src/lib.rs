//! finiq - Cached funding-strategy pipeline
//!
//! Turns a startup description into a funding-strategy report by running a
//! fixed chain of seven generation steps, each building on the outputs of
//! the ones before it.
//!
//! # Architecture
//!
//! - A request is normalized and fingerprinted; the fingerprint is the cache key
//! - On a cache hit the stored report is returned, annotated as cached
//! - On a miss the steps run in order over an append-only context, failures
//!   degrade to heuristics or placeholders, and the assembled report is cached
//! - The cache tries Redis first and falls back to JSON files
//!
//! # Modules
//!
//! - `adapters`: Generation service integration
//! - `cache`: Two-tier result cache
//! - `core`: Orchestration logic (Fingerprint, Steps, Orchestrator)
//! - `domain`: Data structures (RequestRecord, Report, Run)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Generate a report
//! finiq generate --input acme.json
//!
//! # Inspect and clear the cache
//! finiq cache stats
//! finiq cache clear --pattern 'v1:*'
//! ```

pub mod adapters;
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use cache::CacheStore;
pub use core::{Fingerprint, Orchestrator};
pub use domain::{normalize, Report, RequestRecord};
