//! Report assembly.
//!
//! Pure mapping from a finished context and its execution log to a
//! [`Report`]. Slots that were never written become placeholders, so the
//! report always carries all seven sections.

use chrono::{DateTime, Utc};

use super::context::Context;
use super::fingerprint::Fingerprint;
use crate::domain::{
    ExecutionLogEntry, ProfileSection, Report, ReportMetadata, Section,
};

const NOT_AVAILABLE: &str = "N/A";
const NOT_RUN: &str = "Step did not run";

/// Wall-clock facts of the run, measured by the caller
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub execution_time_seconds: f64,
    pub finished_at: DateTime<Utc>,
}

/// Build the report for a completed run
pub fn assemble(
    ctx: &Context,
    execution_log: Vec<ExecutionLogEntry>,
    fingerprint: &Fingerprint,
    timing: Timing,
) -> Report {
    let idea_understanding = match ctx.profile() {
        Some(Ok(profile)) => Section::Ready(ProfileSection::Model(profile.clone())),
        Some(Err(fallback)) => Section::Ready(ProfileSection::Heuristic {
            profile: fallback.profile.clone(),
            reason: fallback.reason.clone(),
        }),
        None => Section::unavailable(NOT_RUN),
    };

    let industry_specialist = slot(ctx.industry());
    let funding_stage = slot(ctx.funding_stage());
    let raise_amount = slot(ctx.raise_amount());
    let investor_type = slot(ctx.investor_type());
    let runway = slot(ctx.runway());
    let financial_priority = slot(ctx.financial_priority());

    let summary = summarize(
        ctx.record().display_name(),
        funding_stage.ready().map(|s| s.funding_stage.as_str()),
        raise_amount.ready().map(|r| r.recommended_amount.as_str()),
        investor_type.ready().map(|i| i.primary_investor_type.as_str()),
        runway.ready().map(|r| r.estimated_runway_months.as_str()),
    );

    let steps_executed = execution_log.iter().map(|entry| entry.step).collect();

    Report {
        startup_name: ctx.record().display_name().to_string(),
        idea_understanding,
        industry_specialist,
        funding_stage,
        raise_amount,
        investor_type,
        runway,
        financial_priority,
        summary,
        metadata: ReportMetadata {
            cached: false,
            execution_time_seconds: timing.execution_time_seconds,
            timestamp: timing.finished_at,
            fingerprint: fingerprint.to_string(),
            steps_executed,
            execution_log,
            cache_retrieval_time_seconds: None,
            original_execution_time_seconds: None,
        },
    }
}

fn slot<T: Clone>(section: Option<&Section<T>>) -> Section<T> {
    section
        .cloned()
        .unwrap_or_else(|| Section::unavailable(NOT_RUN))
}

fn summarize(
    name: &str,
    stage: Option<&str>,
    amount: Option<&str>,
    investor: Option<&str>,
    runway_months: Option<&str>,
) -> String {
    let or_na = |value: Option<&str>| -> String {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    };

    format!(
        "Based on the analysis, {} should target {} stage funding of {} from {}. \
         This will provide approximately {} months of runway to achieve key milestones.",
        name,
        or_na(stage),
        or_na(amount),
        or_na(investor),
        or_na(runway_months),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::StepOutput;
    use crate::domain::{
        FallbackProfile, FundingStage, IdeaProfile, RaiseAmount, RequestRecord, StepKind,
        StepStatus,
    };

    fn timing() -> Timing {
        Timing {
            execution_time_seconds: 1.5,
            finished_at: Utc::now(),
        }
    }

    fn ctx() -> Context {
        Context::new(RequestRecord {
            startup_name: "Acme".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_unwritten_slots_become_placeholders() {
        let mut ctx = ctx();
        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();
        let log = vec![ExecutionLogEntry::ok(StepKind::IdeaUnderstanding, 0.2)];

        let report = assemble(&ctx, log, &Fingerprint::from_raw("v1:abc"), timing());

        assert!(report.idea_understanding.is_ready());
        assert!(!report.runway.is_ready());
        assert!(!report.financial_priority.is_ready());
        assert_eq!(report.metadata.steps_executed, vec![StepKind::IdeaUnderstanding]);
        assert_eq!(report.metadata.fingerprint, "v1:abc");
        assert!(!report.metadata.cached);
    }

    #[test]
    fn test_summary_uses_ready_sections() {
        let mut ctx = ctx();
        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();
        ctx.insert(StepOutput::Industry(Section::unavailable("x"))).unwrap();
        ctx.insert(StepOutput::FundingStage(Section::Ready(FundingStage {
            funding_stage: "Seed".to_string(),
            ..Default::default()
        })))
        .unwrap();
        ctx.insert(StepOutput::RaiseAmount(Section::Ready(RaiseAmount {
            recommended_amount: "$750K".to_string(),
            ..Default::default()
        })))
        .unwrap();

        let report = assemble(&ctx, Vec::new(), &Fingerprint::from_raw("v1:abc"), timing());

        assert_eq!(
            report.summary,
            "Based on the analysis, Acme should target Seed stage funding of $750K from N/A. \
             This will provide approximately N/A months of runway to achieve key milestones."
        );
    }

    #[test]
    fn test_fallback_profile_marked_heuristic() {
        let mut ctx = ctx();
        ctx.insert(StepOutput::Profile(Err(FallbackProfile {
            profile: IdeaProfile::default(),
            reason: "Invalid reply: no JSON object in reply".to_string(),
        })))
        .unwrap();
        let log = vec![ExecutionLogEntry::new(
            StepKind::IdeaUnderstanding,
            StepStatus::Fallback,
            0.1,
        )];

        let report = assemble(&ctx, log, &Fingerprint::from_raw("v1:abc"), timing());

        match report.idea_understanding.ready() {
            Some(ProfileSection::Heuristic { reason, .. }) => assert!(reason.contains("no JSON")),
            other => panic!("unexpected profile section: {:?}", other),
        }
    }
}
