//! Step contract and the seven pipeline steps.
//!
//! A step renders a prompt from its upstream view, and parses the
//! generation reply into a typed output. How a failure is recorded is also
//! the step's decision ([`Step::settle`]): the profile step substitutes a
//! heuristic profile, every other step leaves an unavailable placeholder.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::context::{
    Context, FundingStageView, IndustryView, InvestorView, PriorityView, ProfileView,
    RaiseAmountView, RunwayView, StepOutput,
};
use super::heuristics::heuristic_profile;
use super::prompts;
use super::safety::SafetyViolation;
use crate::domain::{
    FallbackProfile, FinancialPriorities, FundingStage, IdeaProfile, IndustryInsights,
    InvestorFit, RaiseAmount, RequestRecord, RunwayPlan, Section, StepKind, StepStatus,
};

/// Most bullets kept from the industry step
const MAX_BULLETS: usize = 8;

/// Originals kept when every bullet is generic
const KEPT_WHEN_GENERIC: usize = 5;

/// Bullets this short carry no niche-specific information
const MIN_BULLET_CHARS: usize = 20;

const GENERIC_PHRASES: &[&str] = &[
    "operational efficiency",
    "optimize operations",
    "hire key roles",
    "build strong team",
    "focus on growth",
    "improve margins",
    "unit economics",
    "scale the business",
    "customer acquisition",
    "market research",
    "competitive analysis",
    "strategic partnerships",
];

/// Why a step produced no usable output
#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("Generation failed: {0}")]
    Adapter(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid reply: {0}")]
    Parse(String),

    #[error(transparent)]
    Safety(#[from] SafetyViolation),
}

impl StepError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Result of settling a step: what to merge, and how to log it
#[derive(Debug, Clone)]
pub struct Settled {
    pub output: StepOutput,
    pub status: StepStatus,
    pub error: Option<String>,
}

/// One unit of the fixed pipeline
pub trait Step {
    /// Which step this is
    const KIND: StepKind;

    /// Earlier outputs this step may read
    type View<'a>;

    /// Parsed reply
    type Output;

    /// Borrow this step's upstream view from the context
    fn view(ctx: &Context) -> Self::View<'_>;

    /// Render the prompt
    fn prompt(view: &Self::View<'_>) -> String;

    /// Parse and validate a raw reply
    fn parse(raw: &str, view: &Self::View<'_>) -> Result<Self::Output, StepError>;

    /// Turn the step result into a context output and log status
    fn settle(result: Result<Self::Output, StepError>, record: &RequestRecord) -> Settled;
}

/// Ready section on success, placeholder on failure
fn settle_section<T>(
    result: Result<T, StepError>,
    wrap: fn(Section<T>) -> StepOutput,
) -> Settled {
    match result {
        Ok(output) => Settled {
            output: wrap(Section::Ready(output)),
            status: StepStatus::Ok,
            error: None,
        },
        Err(e) => Settled {
            output: wrap(Section::unavailable(e.to_string())),
            status: StepStatus::Failed,
            error: Some(e.to_string()),
        },
    }
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Remove markdown code fences
fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// Cut to the outermost `{...}`
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Drop commas that directly precede `}` or `]`, ignoring string contents
pub(crate) fn repair_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Extract the JSON object from a reply, repairing trailing commas if needed
pub(crate) fn extract_object(raw: &str) -> Result<Value, StepError> {
    let cleaned = strip_fences(raw);
    let candidate = outermost_object(&cleaned)
        .ok_or_else(|| StepError::parse("no JSON object in reply"))?;

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(first) => serde_json::from_str::<Value>(&repair_trailing_commas(candidate))
            .map_err(|_| StepError::parse(format!("malformed JSON: {}", first)))?,
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(StepError::parse("reply is not a JSON object"))
    }
}

/// Fail unless every field is present and non-null
fn require_fields(value: &Value, fields: &[&str]) -> Result<(), StepError> {
    for field in fields {
        if value.get(*field).map_or(true, Value::is_null) {
            return Err(StepError::parse(format!("missing required field '{}'", field)));
        }
    }
    Ok(())
}

fn typed<T: DeserializeOwned>(value: Value) -> Result<T, StepError> {
    serde_json::from_value(value).map_err(|e| StepError::parse(e.to_string()))
}

/// Parse an object reply with mandatory fields into `T`
fn parse_with_required<T: DeserializeOwned>(raw: &str, fields: &[&str]) -> Result<T, StepError> {
    let value = extract_object(raw)?;
    require_fields(&value, fields)?;
    typed(value)
}

fn is_generic(bullet: &str) -> bool {
    let lower = bullet.to_lowercase();
    GENERIC_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Drop generic and short bullets, then cap. If nothing specific survives
/// the first few originals are kept.
fn filter_bullets(bullets: Vec<String>) -> Vec<String> {
    let specific: Vec<String> = bullets
        .iter()
        .filter(|b| b.chars().count() > MIN_BULLET_CHARS && !is_generic(b))
        .cloned()
        .collect();

    if specific.is_empty() {
        bullets.into_iter().take(KEPT_WHEN_GENERIC).collect()
    } else {
        specific.into_iter().take(MAX_BULLETS).collect()
    }
}

/// Mine `-`, `*`, `•` and `1.` style lines from a non-JSON reply
fn bullets_from_text(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim();
            let body = if let Some(rest) = line.strip_prefix(['•', '-', '*']) {
                rest.trim_start_matches(['•', '-', '*', ' '])
            } else {
                let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
                if digits == 0 {
                    return None;
                }
                line[digits..].strip_prefix('.')?
            };
            let body = body.trim();
            (body.chars().count() > MIN_BULLET_CHARS).then(|| body.to_string())
        })
        .take(MAX_BULLETS)
        .collect()
}

// ============================================================================
// Steps
// ============================================================================

pub struct IdeaUnderstandingStep;

impl Step for IdeaUnderstandingStep {
    const KIND: StepKind = StepKind::IdeaUnderstanding;
    type View<'a> = ProfileView<'a>;
    type Output = IdeaProfile;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.profile_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::idea_understanding(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<IdeaProfile, StepError> {
        let value = extract_object(raw)?;
        let known = [
            "category",
            "business_model",
            "capital_intensity",
            "burn_profile",
            "regulation_risk",
            "team_requirements",
        ];
        if !known.iter().any(|k| value.get(*k).is_some()) {
            return Err(StepError::parse("reply has none of the profile fields"));
        }

        let mut profile: IdeaProfile = typed(value)?;
        profile.fill_defaults();
        Ok(profile)
    }

    fn settle(result: Result<IdeaProfile, StepError>, record: &RequestRecord) -> Settled {
        match result {
            Ok(profile) => Settled {
                output: StepOutput::Profile(Ok(profile)),
                status: StepStatus::Ok,
                error: None,
            },
            Err(e) => Settled {
                output: StepOutput::Profile(Err(FallbackProfile {
                    profile: heuristic_profile(record),
                    reason: e.to_string(),
                })),
                status: StepStatus::Fallback,
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct IndustrySpecialistStep;

impl Step for IndustrySpecialistStep {
    const KIND: StepKind = StepKind::IndustrySpecialist;
    type View<'a> = IndustryView<'a>;
    type Output = IndustryInsights;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.industry_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::industry_specialist(view)
    }

    fn parse(raw: &str, view: &Self::View<'_>) -> Result<IndustryInsights, StepError> {
        let mut insights = match extract_object(raw) {
            Ok(value) => {
                if !value.get("bullets").map_or(false, Value::is_array) {
                    return Err(StepError::parse("missing or invalid 'bullets' list"));
                }
                typed::<IndustryInsights>(value)?
            }
            Err(parse_error) => {
                let bullets = bullets_from_text(raw);
                if bullets.is_empty() {
                    return Err(parse_error);
                }
                IndustryInsights {
                    industry_label: view.record.industry.clone(),
                    bullets,
                    confidence: "medium".to_string(),
                }
            }
        };

        insights.bullets = filter_bullets(insights.bullets);
        if insights.bullets.is_empty() {
            return Err(StepError::parse("no industry bullets in reply"));
        }
        if insights.industry_label.is_empty() {
            insights.industry_label = "General".to_string();
        }
        if insights.confidence.is_empty() {
            insights.confidence = "medium".to_string();
        }
        Ok(insights)
    }

    fn settle(result: Result<IndustryInsights, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::Industry)
    }
}

pub struct FundingStageStep;

impl Step for FundingStageStep {
    const KIND: StepKind = StepKind::FundingStage;
    type View<'a> = FundingStageView<'a>;
    type Output = FundingStage;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.funding_stage_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::funding_stage(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<FundingStage, StepError> {
        parse_with_required(raw, &["funding_stage", "confidence", "rationale"])
    }

    fn settle(result: Result<FundingStage, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::FundingStage)
    }
}

pub struct RaiseAmountStep;

impl Step for RaiseAmountStep {
    const KIND: StepKind = StepKind::RaiseAmount;
    type View<'a> = RaiseAmountView<'a>;
    type Output = RaiseAmount;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.raise_amount_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::raise_amount(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<RaiseAmount, StepError> {
        parse_with_required(raw, &["recommended_amount", "rationale"])
    }

    fn settle(result: Result<RaiseAmount, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::RaiseAmount)
    }
}

pub struct InvestorTypeStep;

impl Step for InvestorTypeStep {
    const KIND: StepKind = StepKind::InvestorType;
    type View<'a> = InvestorView<'a>;
    type Output = InvestorFit;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.investor_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::investor_type(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<InvestorFit, StepError> {
        parse_with_required(raw, &["primary_investor_type", "rationale"])
    }

    fn settle(result: Result<InvestorFit, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::InvestorType)
    }
}

pub struct RunwayStep;

impl Step for RunwayStep {
    const KIND: StepKind = StepKind::Runway;
    type View<'a> = RunwayView<'a>;
    type Output = RunwayPlan;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.runway_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::runway(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<RunwayPlan, StepError> {
        parse_with_required(raw, &["estimated_runway_months", "monthly_burn_rate"])
    }

    fn settle(result: Result<RunwayPlan, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::Runway)
    }
}

pub struct FinancialPriorityStep;

impl Step for FinancialPriorityStep {
    const KIND: StepKind = StepKind::FinancialPriority;
    type View<'a> = PriorityView<'a>;
    type Output = FinancialPriorities;

    fn view(ctx: &Context) -> Self::View<'_> {
        ctx.priority_view()
    }

    fn prompt(view: &Self::View<'_>) -> String {
        prompts::financial_priority(view)
    }

    fn parse(raw: &str, _view: &Self::View<'_>) -> Result<FinancialPriorities, StepError> {
        parse_with_required(raw, &["priorities"])
    }

    fn settle(result: Result<FinancialPriorities, StepError>, _record: &RequestRecord) -> Settled {
        settle_section(result, StepOutput::FinancialPriority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(RequestRecord {
            startup_name: "Acme".to_string(),
            industry: "Logistics".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_fenced_reply_with_trailing_comma() {
        let raw = "Here you go:\n```json\n{\"funding_stage\": \"Seed\", \"confidence\": \"high\", \"rationale\": \"Early revenue\",}\n```";
        let ctx = ctx();
        let stage = FundingStageStep::parse(raw, &FundingStageStep::view(&ctx)).unwrap();

        assert_eq!(stage.funding_stage, "Seed");
        assert_eq!(stage.rationale, "Early revenue");
    }

    #[test]
    fn test_missing_required_field() {
        let ctx = ctx();
        let err = RunwayStep::parse("{\"estimated_runway_months\": 18}", &RunwayStep::view(&ctx))
            .unwrap_err();
        assert!(err.to_string().contains("monthly_burn_rate"));
    }

    #[test]
    fn test_repair_ignores_commas_in_strings() {
        let repaired = repair_trailing_commas("{\"a\": \"x, }\", \"b\": [1, 2,],}");
        assert_eq!(repaired, "{\"a\": \"x, }\", \"b\": [1, 2]}");
    }

    #[test]
    fn test_non_object_reply_rejected() {
        assert!(extract_object("no json here").is_err());
        assert!(extract_object("} backwards {").is_err());
    }

    #[test]
    fn test_profile_defaults_filled() {
        let ctx = ctx();
        let profile = IdeaUnderstandingStep::parse(
            "{\"category\": \"Logistics SaaS\", \"capital_intensity\": \"\"}",
            &IdeaUnderstandingStep::view(&ctx),
        )
        .unwrap();

        assert_eq!(profile.category, "Logistics SaaS");
        assert_eq!(profile.capital_intensity, "Medium");
    }

    #[test]
    fn test_profile_failure_settles_to_heuristic() {
        let record = ctx().record().clone();
        let settled = IdeaUnderstandingStep::settle(Err(StepError::parse("garbage")), &record);

        assert_eq!(settled.status, StepStatus::Fallback);
        match settled.output {
            StepOutput::Profile(Err(fallback)) => {
                assert_eq!(fallback.profile.category, "Food / Logistics");
                assert!(fallback.reason.contains("garbage"));
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn test_other_failure_settles_to_placeholder() {
        let record = ctx().record().clone();
        let settled = RunwayStep::settle(Err(StepError::Timeout(Duration::from_secs(5))), &record);

        assert_eq!(settled.status, StepStatus::Failed);
        assert!(matches!(
            settled.output,
            StepOutput::Runway(Section::Unavailable { unavailable: true, .. })
        ));
    }

    #[test]
    fn test_industry_bullets_filtered_and_capped() {
        let mut bullets = vec![
            "Focus on growth".to_string(),
            "Improve unit economics across the board".to_string(),
        ];
        for i in 0..10 {
            bullets.push(format!("Cold-chain trucks cost about ${}K per unit to lease", 40 + i));
        }
        let raw = serde_json::json!({"industry_label": "Cold-chain logistics", "bullets": bullets}).to_string();

        let ctx = ctx();
        let insights = IndustrySpecialistStep::parse(&raw, &IndustrySpecialistStep::view(&ctx)).unwrap();

        assert_eq!(insights.bullets.len(), 8);
        assert!(insights.bullets.iter().all(|b| b.starts_with("Cold-chain")));
        assert_eq!(insights.confidence, "medium");
    }

    #[test]
    fn test_industry_all_generic_keeps_original() {
        let raw = "{\"bullets\": [\"Focus on growth\", \"Market research\"]}";
        let ctx = ctx();
        let insights = IndustrySpecialistStep::parse(raw, &IndustrySpecialistStep::view(&ctx)).unwrap();

        assert_eq!(insights.bullets, vec!["Focus on growth", "Market research"]);
        assert_eq!(insights.industry_label, "General");
    }

    #[test]
    fn test_industry_bullets_from_plain_text() {
        let raw = "Key realities:\n- Last-mile delivery eats 40% of shipping cost\n\
                   2. Warehouse leases run $12 per square foot yearly\n* short\n";
        let ctx = ctx();
        let insights = IndustrySpecialistStep::parse(raw, &IndustrySpecialistStep::view(&ctx)).unwrap();

        assert_eq!(insights.bullets.len(), 2);
        assert_eq!(insights.industry_label, "Logistics");
        assert!(insights.bullets[1].starts_with("Warehouse"));
    }
}
