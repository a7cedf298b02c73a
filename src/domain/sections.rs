//! Typed outputs of the pipeline steps.
//!
//! The generation service returns loosely structured JSON. Every field is
//! defaulted, and scalar fields accept numbers or booleans where a string is
//! expected, so a reply that has the right overall shape always parses.
//! Mandatory fields are checked separately by each step's parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Structured profile of the startup idea (first step)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaProfile {
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "lenient_string")]
    pub business_model: String,
    #[serde(deserialize_with = "lenient_string")]
    pub capital_intensity: String,
    #[serde(deserialize_with = "lenient_string")]
    pub burn_profile: String,
    #[serde(deserialize_with = "lenient_string")]
    pub hardware_dependency: String,
    #[serde(deserialize_with = "lenient_string")]
    pub operational_complexity: String,
    #[serde(deserialize_with = "lenient_string")]
    pub regulation_risk: String,
    #[serde(deserialize_with = "lenient_string")]
    pub scalability_model: String,
    #[serde(deserialize_with = "lenient_string")]
    pub margin_profile: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub team_requirements: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub confidence: String,
    #[serde(deserialize_with = "lenient_string")]
    pub notes: String,
}

impl IdeaProfile {
    /// Fill empty fields with neutral defaults.
    pub fn fill_defaults(&mut self) {
        fn fill(field: &mut String, default: &str) {
            if field.trim().is_empty() {
                *field = default.to_string();
            }
        }

        fill(&mut self.category, "General");
        fill(&mut self.business_model, "Not specified");
        fill(&mut self.capital_intensity, "Medium");
        fill(&mut self.burn_profile, "Medium");
        fill(&mut self.hardware_dependency, "Medium");
        fill(&mut self.operational_complexity, "Medium");
        fill(&mut self.regulation_risk, "Medium");
        fill(&mut self.scalability_model, "Not specified");
        fill(&mut self.margin_profile, "Medium");
        fill(&mut self.confidence, "medium");
    }
}

/// Heuristic profile used when the profile step fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackProfile {
    pub profile: IdeaProfile,
    /// Why the model profile was not used
    pub reason: String,
}

/// Outcome of the profile step: a model profile or the heuristic fallback
pub type ProfileOutcome = Result<IdeaProfile, FallbackProfile>;

/// Niche-specific realities of the startup's industry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndustryInsights {
    #[serde(deserialize_with = "lenient_string")]
    pub industry_label: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub bullets: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub confidence: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingStage {
    #[serde(deserialize_with = "lenient_string")]
    pub funding_stage: String,
    #[serde(deserialize_with = "lenient_string")]
    pub confidence: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rationale: String,
    #[serde(deserialize_with = "lenient_string")]
    pub stage_characteristics: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RaiseAmount {
    #[serde(deserialize_with = "lenient_string")]
    pub recommended_amount: String,
    #[serde(deserialize_with = "lenient_string")]
    pub minimum_viable: String,
    #[serde(deserialize_with = "lenient_string")]
    pub optimal_amount: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rationale: String,
    /// Use of funds, e.g. `team_expansion -> "$200K"`
    #[serde(deserialize_with = "lenient_map")]
    pub breakdown: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestorFit {
    #[serde(deserialize_with = "lenient_string")]
    pub primary_investor_type: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub secondary_options: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub specific_investors: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub avoid: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub rationale: String,
    #[serde(deserialize_with = "lenient_string")]
    pub target_profile: String,
    #[serde(deserialize_with = "lenient_string")]
    pub approach_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunwayPlan {
    #[serde(deserialize_with = "lenient_string")]
    pub estimated_runway_months: String,
    #[serde(deserialize_with = "lenient_string")]
    pub monthly_burn_rate: String,
    #[serde(deserialize_with = "lenient_map")]
    pub assumptions: BTreeMap<String, String>,
    #[serde(deserialize_with = "lenient_string")]
    pub revenue_impact: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub key_milestones: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub burn_rate_guidance: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Priority {
    #[serde(deserialize_with = "lenient_string")]
    pub priority: String,
    #[serde(deserialize_with = "lenient_string")]
    pub importance: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rationale: String,
    #[serde(deserialize_with = "lenient_string")]
    pub timeline: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estimated_cost: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialPriorities {
    #[serde(deserialize_with = "lenient_priorities")]
    pub priorities: Vec<Priority>,
    #[serde(deserialize_with = "lenient_strings")]
    pub quick_wins: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub avoid: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub success_metrics: Vec<String>,
}

// ============================================================================
// Lenient field deserializers
// ============================================================================

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(value).unwrap_or_default())
}

/// A list of strings; a single scalar becomes a one-element list
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        Value::Null => Vec::new(),
        scalar => scalar_to_string(scalar).into_iter().collect(),
    };
    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}

fn lenient_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Priority objects; bare strings become a priority with only a title
fn lenient_priorities<'de, D>(deserializer: D) -> Result<Vec<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).ok(),
            scalar => scalar_to_string(scalar).map(|priority| Priority {
                priority,
                ..Default::default()
            }),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_accepted_as_strings() {
        let runway: RunwayPlan = serde_json::from_value(json!({
            "estimated_runway_months": 18,
            "monthly_burn_rate": "$40K",
            "assumptions": {"team_costs": 25000},
        }))
        .unwrap();

        assert_eq!(runway.estimated_runway_months, "18");
        assert_eq!(runway.assumptions.get("team_costs").unwrap(), "25000");
        assert!(runway.key_milestones.is_empty());
    }

    #[test]
    fn test_scalar_becomes_list() {
        let investors: InvestorFit = serde_json::from_value(json!({
            "primary_investor_type": "Angel Investors",
            "secondary_options": "Accelerators",
            "avoid": null,
        }))
        .unwrap();

        assert_eq!(investors.secondary_options, vec!["Accelerators"]);
        assert!(investors.avoid.is_empty());
    }

    #[test]
    fn test_priorities_accept_strings() {
        let priorities: FinancialPriorities = serde_json::from_value(json!({
            "priorities": [
                "Hire a fractional CFO",
                {"priority": "Cut cloud spend", "importance": "high", "timeline": 30}
            ],
        }))
        .unwrap();

        assert_eq!(priorities.priorities.len(), 2);
        assert_eq!(priorities.priorities[0].priority, "Hire a fractional CFO");
        assert_eq!(priorities.priorities[1].timeline, "30");
    }

    #[test]
    fn test_profile_fill_defaults() {
        let mut profile: IdeaProfile = serde_json::from_value(json!({
            "category": "Logistics SaaS",
            "burn_profile": "",
        }))
        .unwrap();
        profile.fill_defaults();

        assert_eq!(profile.category, "Logistics SaaS");
        assert_eq!(profile.burn_profile, "Medium");
        assert_eq!(profile.confidence, "medium");
        assert!(profile.team_requirements.is_empty());
    }
}
