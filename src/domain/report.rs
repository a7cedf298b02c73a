//! The assembled report returned to callers and stored in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::{ExecutionLogEntry, StepKind};
use super::sections::{
    FinancialPriorities, FundingStage, IdeaProfile, IndustryInsights, InvestorFit, RaiseAmount,
    RunwayPlan,
};

/// A report section: the step's output, or an explicit placeholder.
///
/// Serialized untagged, so a ready section is just the step's object and a
/// placeholder is `{"unavailable": true, "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    /// Listed first so placeholders are not swallowed by defaulted outputs
    Unavailable { unavailable: bool, reason: String },
    Ready(T),
}

impl<T> Section<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Section::Unavailable {
            unavailable: true,
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }
}

/// The profile section records where the profile came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ProfileSection {
    /// Parsed from the generation service
    Model(IdeaProfile),

    /// Derived from the request alone
    Heuristic { profile: IdeaProfile, reason: String },
}

impl ProfileSection {
    pub fn profile(&self) -> &IdeaProfile {
        match self {
            ProfileSection::Model(profile) => profile,
            ProfileSection::Heuristic { profile, .. } => profile,
        }
    }
}

/// A complete funding-strategy report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub startup_name: String,
    pub idea_understanding: Section<ProfileSection>,
    pub industry_specialist: Section<IndustryInsights>,
    pub funding_stage: Section<FundingStage>,
    pub raise_amount: Section<RaiseAmount>,
    pub investor_type: Section<InvestorFit>,
    pub runway: Section<RunwayPlan>,
    pub financial_priority: Section<FinancialPriorities>,
    /// One-paragraph recap of stage, amount, investors and runway
    pub summary: String,
    pub metadata: ReportMetadata,
}

impl Report {
    /// Annotate a report read from the cache.
    ///
    /// `execution_time_seconds` is left as stored and copied into
    /// `original_execution_time_seconds`.
    pub fn mark_cached(&mut self, retrieval_seconds: f64) {
        self.metadata.cached = true;
        self.metadata.cache_retrieval_time_seconds = Some(retrieval_seconds);
        self.metadata.original_execution_time_seconds = Some(self.metadata.execution_time_seconds);
    }
}

/// Run metadata attached to every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Whether this report was served from the cache
    pub cached: bool,

    /// Wall time of the run that produced the report
    pub execution_time_seconds: f64,

    /// When the report was assembled
    pub timestamp: DateTime<Utc>,

    /// Cache key of the normalized request
    pub fingerprint: String,

    /// Steps in the order they ran
    pub steps_executed: Vec<StepKind>,

    pub execution_log: Vec<ExecutionLogEntry>,

    /// Time to fetch the report from the cache (hits only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_retrieval_time_seconds: Option<f64>,

    /// Execution time of the run that populated the cache (hits only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_execution_time_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_shape() {
        let section: Section<FundingStage> = Section::unavailable("generation timed out");
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, json!({"unavailable": true, "reason": "generation timed out"}));

        let parsed: Section<FundingStage> = serde_json::from_value(json).unwrap();
        assert!(!parsed.is_ready());
    }

    #[test]
    fn test_ready_section_is_plain_object() {
        let section = Section::Ready(FundingStage {
            funding_stage: "Seed".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["funding_stage"], "Seed");
        assert!(json.get("unavailable").is_none());

        let parsed: Section<FundingStage> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.ready().unwrap().funding_stage, "Seed");
    }

    #[test]
    fn test_profile_section_tagged_by_source() {
        let section = ProfileSection::Heuristic {
            profile: IdeaProfile::default(),
            reason: "invalid reply".to_string(),
        };
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["source"], "heuristic");
        assert_eq!(json["reason"], "invalid reply");

        let model = serde_json::to_value(ProfileSection::Model(IdeaProfile {
            category: "Fintech".to_string(),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(model["source"], "model");
        assert_eq!(model["category"], "Fintech");
    }
}
