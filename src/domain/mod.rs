//! Domain types for the funding-strategy pipeline.
//!
//! This module contains the core data structures:
//! - Request: normalized input record
//! - Sections: typed step outputs
//! - Report: assembled result and metadata
//! - Events: execution log entries and step identity
//! - Run: run lifecycle phases

pub mod events;
pub mod report;
pub mod request;
pub mod run;
pub mod sections;

// Re-export commonly used types
pub use events::{ExecutionLogEntry, StepKind, StepStatus};
pub use report::{ProfileSection, Report, ReportMetadata, Section};
pub use request::{normalize, RequestRecord};
pub use run::{Run, RunError, RunPhase};
pub use sections::{
    FallbackProfile, FinancialPriorities, FundingStage, IdeaProfile, IndustryInsights,
    InvestorFit, Priority, ProfileOutcome, RaiseAmount, RunwayPlan,
};
