//! Request normalization.
//!
//! The inbound request is loosely shaped JSON coming from a web form.
//! Everything the pipeline and the cache see goes through [`normalize`],
//! which always succeeds: bad or missing values are defaulted, never
//! rejected, so the only guarantee downstream code relies on is a stable
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical product stages. Anything else is kept as trimmed free text.
const PRODUCT_STAGES: [&str; 5] = ["Idea", "MVP", "Beta", "Revenue", "Growth"];

/// The canonical, normalized input to one pipeline run.
///
/// Two requests that differ only in whitespace, number formatting or
/// excluded fields (caller ids, timestamps, trace ids) normalize to equal
/// records, and therefore to the same fingerprint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestRecord {
    pub startup_name: String,
    pub one_line_description: String,
    pub idea_description: String,
    pub industry: String,
    pub target_market: String,
    pub geography: String,
    pub team_size: u32,
    pub product_stage: String,
    pub monthly_revenue: f64,
    /// Month-over-month growth in percent
    pub growth_rate: f64,
    pub traction_summary: String,
    pub business_model: String,
    /// Requested raise in USD, 0 when not specified
    pub funding_goal: f64,
    pub main_financial_concern: String,
}

impl RequestRecord {
    /// Display name used in logs and the report header
    pub fn display_name(&self) -> &str {
        if self.startup_name.is_empty() {
            "Unnamed startup"
        } else {
            &self.startup_name
        }
    }

    /// All free-text fields joined and lowercased, for keyword heuristics
    pub fn keyword_text(&self) -> String {
        [
            self.industry.as_str(),
            self.idea_description.as_str(),
            self.one_line_description.as_str(),
            self.startup_name.as_str(),
            self.business_model.as_str(),
        ]
        .join(" ")
        .to_lowercase()
    }
}

/// Normalize a raw request into a [`RequestRecord`].
///
/// Keys are accepted in camelCase (as the form sends them) or snake_case.
/// Unknown keys are ignored, which is also how caller identifiers and
/// request timestamps are excluded from the cache key.
pub fn normalize(raw: &Value) -> RequestRecord {
    let startup_name = text(raw, &["startupName", "startup_name"]);
    let traction_summary = text(raw, &["tractionSummary", "traction_summary"]);

    let mut one_line_description = text(raw, &["oneLineDescription", "one_line_description"]);
    if one_line_description.is_empty() {
        one_line_description = startup_name.clone();
    }

    let mut idea_description = text(raw, &["ideaDescription", "idea_description"]);
    if idea_description.is_empty() {
        idea_description = traction_summary.clone();
    }

    RequestRecord {
        startup_name,
        one_line_description,
        idea_description,
        industry: text(raw, &["industry"]),
        target_market: text(raw, &["targetMarket", "target_market"]),
        geography: text(raw, &["geography"]),
        team_size: count(raw, &["teamSize", "team_size"]),
        product_stage: product_stage(&text(raw, &["productStage", "product_stage"])),
        monthly_revenue: number(raw, &["monthlyRevenue", "monthly_revenue"]),
        growth_rate: number(raw, &["growthRate", "growth_rate"]),
        traction_summary,
        business_model: text(raw, &["businessModel", "business_model"]),
        funding_goal: number(raw, &["fundingGoal", "funding_goal"]),
        main_financial_concern: text(
            raw,
            &["mainFinancialConcern", "main_financial_concern", "primaryFinancialConcern"],
        ),
    }
}

/// First present, non-null value among the given keys
fn lookup<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn text(raw: &Value, keys: &[&str]) -> String {
    match lookup(raw, keys) {
        Some(Value::String(s)) => collapse_whitespace(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number(raw: &Value, keys: &[&str]) -> f64 {
    let value = match lookup(raw, keys) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_numeric(s).unwrap_or(0.0),
        _ => 0.0,
    };

    // -0.0 and 0.0 serialize differently; fold them together
    if value.is_finite() && value != 0.0 {
        value
    } else {
        0.0
    }
}

fn count(raw: &Value, keys: &[&str]) -> u32 {
    let value = number(raw, keys);
    if value <= 0.0 {
        0
    } else if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value.round() as u32
    }
}

/// Parse strings like `"$12,500"`, `" 15% "`, `"3"` into numbers.
pub(crate) fn parse_numeric(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn product_stage(raw: &str) -> String {
    PRODUCT_STAGES
        .iter()
        .find(|stage| stage.eq_ignore_ascii_case(raw))
        .map(|stage| stage.to_string())
        .unwrap_or_else(|| raw.to_string())
}
