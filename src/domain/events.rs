//! Execution log types.
//!
//! Every step of a run leaves exactly one [`ExecutionLogEntry`], appended in
//! execution order. The log travels inside the report metadata, so it is
//! also what a cached report shows about the run that produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    IdeaUnderstanding,
    IndustrySpecialist,
    FundingStage,
    RaiseAmount,
    InvestorType,
    Runway,
    FinancialPriority,
}

impl StepKind {
    /// The fixed pipeline sequence
    pub const ALL: [StepKind; 7] = [
        StepKind::IdeaUnderstanding,
        StepKind::IndustrySpecialist,
        StepKind::FundingStage,
        StepKind::RaiseAmount,
        StepKind::InvestorType,
        StepKind::Runway,
        StepKind::FinancialPriority,
    ];

    /// Section key in the report and the context
    pub fn key(self) -> &'static str {
        match self {
            StepKind::IdeaUnderstanding => "idea_understanding",
            StepKind::IndustrySpecialist => "industry_specialist",
            StepKind::FundingStage => "funding_stage",
            StepKind::RaiseAmount => "raise_amount",
            StepKind::InvestorType => "investor_type",
            StepKind::Runway => "runway",
            StepKind::FinancialPriority => "financial_priority",
        }
    }

    /// Position in the sequence
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse a section key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Output parsed and merged
    Ok,

    /// Step failed, heuristic output merged instead
    Fallback,

    /// Step failed, section left unavailable
    Failed,
}

/// One line of the per-run execution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Step this entry describes
    pub step: StepKind,

    /// Outcome of the step
    pub status: StepStatus,

    /// Wall time spent in the step, in seconds
    pub duration_seconds: f64,

    /// Error description for fallback/failed steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionLogEntry {
    /// Create a successful entry
    pub fn ok(step: StepKind, duration_seconds: f64) -> Self {
        Self {
            step,
            status: StepStatus::Ok,
            duration_seconds,
            error: None,
        }
    }

    /// Create an entry with a non-ok status
    pub fn new(step: StepKind, status: StepStatus, duration_seconds: f64) -> Self {
        Self {
            step,
            status,
            duration_seconds,
            error: None,
        }
    }

    /// Attach error information
    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_order_matches_index() {
        for (i, kind) in StepKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_step_kind_serializes_as_key() {
        for kind in StepKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.key()));
            assert_eq!(StepKind::from_key(kind.key()), Some(kind));
        }
    }

    #[test]
    fn test_entry_with_error() {
        let entry = ExecutionLogEntry::new(StepKind::Runway, StepStatus::Failed, 0.5)
            .with_error("generation timed out".to_string());

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "generation timed out");

        let ok = serde_json::to_value(ExecutionLogEntry::ok(StepKind::Runway, 0.1)).unwrap();
        assert!(ok.get("error").is_none());
    }
}
