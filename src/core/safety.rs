//! Safety limits and enforcement for pipeline execution.
//!
//! Bounds what a single step may send to and accept from the generation
//! service:
//! - Per-step timeouts
//! - Prompt sizes
//! - Reply sizes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safety limits for pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Per-step timeout in seconds (default: 60)
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,

    /// Maximum prompt size in bytes (default: 64KB)
    #[serde(default = "default_max_prompt_bytes")]
    pub max_prompt_bytes: u64,

    /// Maximum reply size in bytes (default: 256KB)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

fn default_step_timeout() -> u64 {
    60
}
fn default_max_prompt_bytes() -> u64 {
    64 * 1024
}
fn default_max_output_bytes() -> u64 {
    256 * 1024
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            step_timeout_seconds: default_step_timeout(),
            max_prompt_bytes: default_max_prompt_bytes(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl SafetyLimits {
    /// Validate a prompt against size limits
    pub fn validate_prompt(&self, prompt: &str) -> Result<(), SafetyViolation> {
        let size = prompt.len() as u64;
        if size > self.max_prompt_bytes {
            return Err(SafetyViolation::MaxPromptBytes {
                actual: size,
                limit: self.max_prompt_bytes,
            });
        }
        Ok(())
    }

    /// Validate a reply against size limits
    pub fn validate_output(&self, output: &str) -> Result<(), SafetyViolation> {
        let size = output.len() as u64;
        if size > self.max_output_bytes {
            return Err(SafetyViolation::MaxOutputBytes {
                actual: size,
                limit: self.max_output_bytes,
            });
        }
        Ok(())
    }
}

/// Tracks resource usage during a run
#[derive(Debug, Clone, Default)]
pub struct SafetyTracker {
    /// Number of steps executed
    pub steps_executed: u32,

    /// Total prompt bytes sent
    pub prompt_bytes: u64,

    /// Total reply bytes received
    pub output_bytes: u64,
}

impl SafetyTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            steps_executed: 0,
            prompt_bytes: 0,
            output_bytes: 0,
        }
    }

    /// Record a step execution
    pub fn record_step(&mut self, prompt_bytes: u64, output_bytes: u64) {
        self.steps_executed += 1;
        self.prompt_bytes += prompt_bytes;
        self.output_bytes += output_bytes;
    }
}

/// Safety violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Maximum prompt bytes exceeded: {actual} > {limit}")]
    MaxPromptBytes { actual: u64, limit: u64 },

    #[error("Maximum output bytes exceeded: {actual} > {limit}")]
    MaxOutputBytes { actual: u64, limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SafetyLimits::default();
        assert_eq!(limits.step_timeout_seconds, 60);
        assert_eq!(limits.max_output_bytes, 256 * 1024);
    }

    #[test]
    fn test_output_validation() {
        let limits = SafetyLimits {
            max_output_bytes: 100,
            ..Default::default()
        };

        assert!(limits.validate_output("short").is_ok());

        let long_output = "x".repeat(200);
        let result = limits.validate_output(&long_output);
        assert!(matches!(result, Err(SafetyViolation::MaxOutputBytes { actual: 200, .. })));
    }

    #[test]
    fn test_prompt_validation() {
        let limits = SafetyLimits {
            max_prompt_bytes: 10,
            ..Default::default()
        };

        assert!(limits.validate_prompt("0123456789").is_ok());
        assert!(limits.validate_prompt("0123456789a").is_err());
    }

    #[test]
    fn test_tracker_accumulates() {
        let mut tracker = SafetyTracker::new();
        tracker.record_step(100, 40);
        tracker.record_step(50, 10);

        assert_eq!(tracker.steps_executed, 2);
        assert_eq!(tracker.prompt_bytes, 150);
        assert_eq!(tracker.output_bytes, 50);
    }

    #[test]
    fn test_limits_from_yaml_defaults() {
        let limits: SafetyLimits = serde_yaml::from_str("step_timeout_seconds: 15").unwrap();
        assert_eq!(limits.step_timeout_seconds, 15);
        assert_eq!(limits.max_prompt_bytes, 64 * 1024);
    }
}
