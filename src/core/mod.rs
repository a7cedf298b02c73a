//! Core orchestration logic.
//!
//! This module contains:
//! - Fingerprint: versioned cache keys
//! - Pipeline: step parameters and timeouts
//! - Safety: prompt/reply limits
//! - Context, Steps, Prompts, Heuristics: the seven-step chain
//! - Assembler: report construction
//! - Orchestrator: main execution engine

pub mod assembler;
pub mod context;
pub mod fingerprint;
pub mod heuristics;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod safety;
pub mod steps;

// Re-export commonly used types
pub use assembler::{assemble, Timing};
pub use context::{Context, ContextError, StepOutput};
pub use fingerprint::{canonical_json, fingerprint, Fingerprint};
pub use orchestrator::Orchestrator;
pub use pipeline::{GenerationParams, Pipeline, Step as PipelineStep, StepOverride};
pub use safety::{SafetyLimits, SafetyTracker, SafetyViolation};
pub use steps::{Settled, Step, StepError};
