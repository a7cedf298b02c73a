//! Run lifecycle.
//!
//! A run moves through a fixed set of phases:
//!
//! ```text
//! start -> normalized -> cache_checked -> cache_hit -> done
//!                                      \-> running_steps -> assembling -> cached -> done
//! ```
//!
//! Any other transition is an orchestrator defect and surfaces as a
//! [`RunError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Phase of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    Normalized,
    CacheChecked,
    CacheHit,
    RunningSteps,
    Assembling,
    /// Report handed to the cache (whether or not the write succeeded)
    Cached,
    Done,
}

impl RunPhase {
    /// Whether `next` is a legal successor of this phase
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        use RunPhase::*;

        matches!(
            (self, next),
            (Start, Normalized)
                | (Normalized, CacheChecked)
                | (CacheChecked, CacheHit)
                | (CacheChecked, RunningSteps)
                | (CacheHit, Done)
                | (RunningSteps, Assembling)
                | (Assembling, Cached)
                | (Cached, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == RunPhase::Done
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Start => "start",
            RunPhase::Normalized => "normalized",
            RunPhase::CacheChecked => "cache_checked",
            RunPhase::CacheHit => "cache_hit",
            RunPhase::RunningSteps => "running_steps",
            RunPhase::Assembling => "assembling",
            RunPhase::Cached => "cached",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Illegal phase transition
#[derive(Debug, Clone, Error)]
#[error("Run {run_id}: illegal transition {from} -> {to}")]
pub struct RunError {
    pub run_id: Uuid,
    pub from: RunPhase,
    pub to: RunPhase,
}

/// A single run of the pipeline
#[derive(Debug, Clone)]
pub struct Run {
    /// Unique identifier, used in tracing spans only
    pub id: Uuid,

    /// Current phase
    phase: RunPhase,

    /// Phases visited, in order
    history: Vec<RunPhase>,
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

impl Run {
    /// Create a run in the `start` phase
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: RunPhase::Start,
            history: vec![RunPhase::Start],
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn history(&self) -> &[RunPhase] {
        &self.history
    }

    /// Move to the next phase, rejecting illegal transitions
    pub fn advance(&mut self, next: RunPhase) -> Result<(), RunError> {
        if !self.phase.can_advance_to(next) {
            return Err(RunError {
                run_id: self.id,
                from: self.phase,
                to: next,
            });
        }

        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Check if the run has reached `done`
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}
