//! Per-run shared context.
//!
//! The context starts with the normalized request and gains exactly one
//! slot per step, strictly in pipeline order. Writes are append-only:
//! filling a slot twice or skipping ahead is a [`ContextError`].
//!
//! Steps never see the context itself. Each step reads a dedicated view
//! struct holding only the outputs of steps that ran before it, so a step
//! cannot depend on a later section by construction.

use thiserror::Error;

use super::heuristics::{investors_for_stage, stage_heuristic, DEFAULT_RAISE_AMOUNT};
use crate::domain::{
    FinancialPriorities, FundingStage, IdeaProfile, IndustryInsights, InvestorFit,
    ProfileOutcome, RaiseAmount, RequestRecord, RunwayPlan, Section, StepKind,
};

/// Context write errors. These are orchestrator defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Context slot '{0}' written twice")]
    AlreadyWritten(StepKind),

    #[error("Context slot '{got}' written out of order (expected '{expected}')")]
    OutOfOrder { expected: StepKind, got: StepKind },

    #[error("Context slot '{0}' written after the pipeline finished")]
    Complete(StepKind),
}

/// Output of one step, ready to merge into the context
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Profile(ProfileOutcome),
    Industry(Section<IndustryInsights>),
    FundingStage(Section<FundingStage>),
    RaiseAmount(Section<RaiseAmount>),
    InvestorType(Section<InvestorFit>),
    Runway(Section<RunwayPlan>),
    FinancialPriority(Section<FinancialPriorities>),
}

impl StepOutput {
    pub fn kind(&self) -> StepKind {
        match self {
            StepOutput::Profile(_) => StepKind::IdeaUnderstanding,
            StepOutput::Industry(_) => StepKind::IndustrySpecialist,
            StepOutput::FundingStage(_) => StepKind::FundingStage,
            StepOutput::RaiseAmount(_) => StepKind::RaiseAmount,
            StepOutput::InvestorType(_) => StepKind::InvestorType,
            StepOutput::Runway(_) => StepKind::Runway,
            StepOutput::FinancialPriority(_) => StepKind::FinancialPriority,
        }
    }
}

/// Append-only state of one run
#[derive(Debug, Clone)]
pub struct Context {
    record: RequestRecord,
    profile: Option<ProfileOutcome>,
    industry: Option<Section<IndustryInsights>>,
    funding_stage: Option<Section<FundingStage>>,
    raise_amount: Option<Section<RaiseAmount>>,
    investor_type: Option<Section<InvestorFit>>,
    runway: Option<Section<RunwayPlan>>,
    financial_priority: Option<Section<FinancialPriorities>>,
    /// Number of slots written so far
    written: usize,
}

impl Context {
    pub fn new(record: RequestRecord) -> Self {
        Self {
            record,
            profile: None,
            industry: None,
            funding_stage: None,
            raise_amount: None,
            investor_type: None,
            runway: None,
            financial_priority: None,
            written: 0,
        }
    }

    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    /// Step expected to write next, `None` once all slots are filled
    pub fn next_step(&self) -> Option<StepKind> {
        StepKind::ALL.get(self.written).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.written == StepKind::ALL.len()
    }

    fn is_written(&self, kind: StepKind) -> bool {
        kind.index() < self.written
    }

    /// Merge a step output into its slot
    pub fn insert(&mut self, output: StepOutput) -> Result<(), ContextError> {
        let kind = output.kind();

        if self.is_written(kind) {
            return Err(ContextError::AlreadyWritten(kind));
        }
        let expected = self.next_step().ok_or(ContextError::Complete(kind))?;
        if expected != kind {
            return Err(ContextError::OutOfOrder {
                expected,
                got: kind,
            });
        }

        match output {
            StepOutput::Profile(v) => self.profile = Some(v),
            StepOutput::Industry(v) => self.industry = Some(v),
            StepOutput::FundingStage(v) => self.funding_stage = Some(v),
            StepOutput::RaiseAmount(v) => self.raise_amount = Some(v),
            StepOutput::InvestorType(v) => self.investor_type = Some(v),
            StepOutput::Runway(v) => self.runway = Some(v),
            StepOutput::FinancialPriority(v) => self.financial_priority = Some(v),
        }
        self.written += 1;
        Ok(())
    }

    // Slot accessors for assembly

    pub fn profile(&self) -> Option<&ProfileOutcome> {
        self.profile.as_ref()
    }

    pub fn industry(&self) -> Option<&Section<IndustryInsights>> {
        self.industry.as_ref()
    }

    pub fn funding_stage(&self) -> Option<&Section<FundingStage>> {
        self.funding_stage.as_ref()
    }

    pub fn raise_amount(&self) -> Option<&Section<RaiseAmount>> {
        self.raise_amount.as_ref()
    }

    pub fn investor_type(&self) -> Option<&Section<InvestorFit>> {
        self.investor_type.as_ref()
    }

    pub fn runway(&self) -> Option<&Section<RunwayPlan>> {
        self.runway.as_ref()
    }

    pub fn financial_priority(&self) -> Option<&Section<FinancialPriorities>> {
        self.financial_priority.as_ref()
    }

    // Upstream views, one per step

    pub fn profile_view(&self) -> ProfileView<'_> {
        ProfileView {
            record: &self.record,
        }
    }

    pub fn industry_view(&self) -> IndustryView<'_> {
        IndustryView {
            record: &self.record,
            profile: self.profile_ref(),
        }
    }

    pub fn funding_stage_view(&self) -> FundingStageView<'_> {
        FundingStageView {
            record: &self.record,
            profile: self.profile_ref(),
            industry: ready(&self.industry),
        }
    }

    pub fn raise_amount_view(&self) -> RaiseAmountView<'_> {
        RaiseAmountView {
            record: &self.record,
            profile: self.profile_ref(),
            industry: ready(&self.industry),
            funding_stage: ready(&self.funding_stage),
        }
    }

    pub fn investor_view(&self) -> InvestorView<'_> {
        InvestorView {
            record: &self.record,
            profile: self.profile_ref(),
            industry: ready(&self.industry),
            funding_stage: ready(&self.funding_stage),
            raise_amount: ready(&self.raise_amount),
        }
    }

    pub fn runway_view(&self) -> RunwayView<'_> {
        RunwayView {
            record: &self.record,
            profile: self.profile_ref(),
            industry: ready(&self.industry),
            funding_stage: ready(&self.funding_stage),
            raise_amount: ready(&self.raise_amount),
        }
    }

    pub fn priority_view(&self) -> PriorityView<'_> {
        PriorityView {
            record: &self.record,
            profile: self.profile_ref(),
            industry: ready(&self.industry),
            funding_stage: ready(&self.funding_stage),
            raise_amount: ready(&self.raise_amount),
            investor_type: ready(&self.investor_type),
            runway: ready(&self.runway),
        }
    }

    /// The profile in use, model-derived or heuristic
    fn profile_ref(&self) -> Option<&IdeaProfile> {
        self.profile.as_ref().map(|outcome| match outcome {
            Ok(profile) => profile,
            Err(fallback) => &fallback.profile,
        })
    }
}

fn ready<T>(slot: &Option<Section<T>>) -> Option<&T> {
    slot.as_ref().and_then(Section::ready)
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Funding stage from upstream, or the request heuristic
fn stage_or_default(stage: Option<&FundingStage>, record: &RequestRecord) -> String {
    stage
        .and_then(|s| non_empty(&s.funding_stage))
        .unwrap_or_else(|| stage_heuristic(record))
        .to_string()
}

/// Recommended raise from upstream, or the default amount
fn raise_or_default(raise: Option<&RaiseAmount>) -> String {
    raise
        .and_then(|r| non_empty(&r.recommended_amount))
        .unwrap_or(DEFAULT_RAISE_AMOUNT)
        .to_string()
}

/// Input of the profile step: the request alone
#[derive(Debug, Clone, Copy)]
pub struct ProfileView<'a> {
    pub record: &'a RequestRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct IndustryView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
}

#[derive(Debug, Clone, Copy)]
pub struct FundingStageView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
    pub industry: Option<&'a IndustryInsights>,
}

#[derive(Debug, Clone, Copy)]
pub struct RaiseAmountView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
    pub industry: Option<&'a IndustryInsights>,
    pub funding_stage: Option<&'a FundingStage>,
}

impl RaiseAmountView<'_> {
    pub fn stage(&self) -> String {
        stage_or_default(self.funding_stage, self.record)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InvestorView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
    pub industry: Option<&'a IndustryInsights>,
    pub funding_stage: Option<&'a FundingStage>,
    pub raise_amount: Option<&'a RaiseAmount>,
}

impl InvestorView<'_> {
    pub fn stage(&self) -> String {
        stage_or_default(self.funding_stage, self.record)
    }

    pub fn raise(&self) -> String {
        raise_or_default(self.raise_amount)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunwayView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
    pub industry: Option<&'a IndustryInsights>,
    pub funding_stage: Option<&'a FundingStage>,
    pub raise_amount: Option<&'a RaiseAmount>,
}

impl RunwayView<'_> {
    pub fn stage(&self) -> String {
        stage_or_default(self.funding_stage, self.record)
    }

    /// Runway is planned against the optimal raise when one is given
    pub fn raise(&self) -> String {
        self.raise_amount
            .and_then(|r| non_empty(&r.optimal_amount))
            .map(str::to_string)
            .unwrap_or_else(|| raise_or_default(self.raise_amount))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PriorityView<'a> {
    pub record: &'a RequestRecord,
    pub profile: Option<&'a IdeaProfile>,
    pub industry: Option<&'a IndustryInsights>,
    pub funding_stage: Option<&'a FundingStage>,
    pub raise_amount: Option<&'a RaiseAmount>,
    pub investor_type: Option<&'a InvestorFit>,
    pub runway: Option<&'a RunwayPlan>,
}

impl PriorityView<'_> {
    pub fn stage(&self) -> String {
        stage_or_default(self.funding_stage, self.record)
    }

    pub fn raise(&self) -> String {
        raise_or_default(self.raise_amount)
    }

    pub fn investor(&self) -> String {
        self.investor_type
            .and_then(|i| non_empty(&i.primary_investor_type))
            .map(str::to_string)
            .unwrap_or_else(|| investors_for_stage(&self.stage()).to_string())
    }

    pub fn runway_months(&self) -> Option<&str> {
        self.runway.and_then(|r| non_empty(&r.estimated_runway_months))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FallbackProfile;

    fn record() -> RequestRecord {
        RequestRecord {
            startup_name: "Acme".to_string(),
            product_stage: "MVP".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_slots_fill_in_order() {
        let mut ctx = Context::new(record());
        assert_eq!(ctx.next_step(), Some(StepKind::IdeaUnderstanding));

        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();
        ctx.insert(StepOutput::Industry(Section::unavailable("timeout"))).unwrap();

        assert_eq!(ctx.next_step(), Some(StepKind::FundingStage));
        assert!(!ctx.is_complete());
    }

    #[test]
    fn test_double_write_rejected() {
        let mut ctx = Context::new(record());
        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();

        let err = ctx
            .insert(StepOutput::Profile(Ok(IdeaProfile::default())))
            .unwrap_err();
        assert_eq!(err, ContextError::AlreadyWritten(StepKind::IdeaUnderstanding));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut ctx = Context::new(record());
        let err = ctx
            .insert(StepOutput::Runway(Section::unavailable("skipped")))
            .unwrap_err();

        assert_eq!(
            err,
            ContextError::OutOfOrder {
                expected: StepKind::IdeaUnderstanding,
                got: StepKind::Runway,
            }
        );
        assert!(ctx.runway().is_none());
    }

    #[test]
    fn test_views_expose_fallback_profile() {
        let mut ctx = Context::new(record());
        let fallback = FallbackProfile {
            profile: IdeaProfile {
                category: "SaaS / Software".to_string(),
                ..Default::default()
            },
            reason: "invalid reply".to_string(),
        };
        ctx.insert(StepOutput::Profile(Err(fallback))).unwrap();

        let view = ctx.industry_view();
        assert_eq!(view.profile.unwrap().category, "SaaS / Software");
    }

    #[test]
    fn test_view_defaults_when_upstream_missing() {
        let mut ctx = Context::new(record());
        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();
        ctx.insert(StepOutput::Industry(Section::unavailable("x"))).unwrap();
        ctx.insert(StepOutput::FundingStage(Section::unavailable("x"))).unwrap();
        ctx.insert(StepOutput::RaiseAmount(Section::unavailable("x"))).unwrap();

        let view = ctx.investor_view();
        assert!(view.industry.is_none());
        assert_eq!(view.stage(), "Pre-Seed");
        assert_eq!(view.raise(), "$500K");
    }

    #[test]
    fn test_runway_prefers_optimal_amount() {
        let mut ctx = Context::new(record());
        ctx.insert(StepOutput::Profile(Ok(IdeaProfile::default()))).unwrap();
        ctx.insert(StepOutput::Industry(Section::unavailable("x"))).unwrap();
        ctx.insert(StepOutput::FundingStage(Section::Ready(FundingStage {
            funding_stage: "Seed".to_string(),
            ..Default::default()
        })))
        .unwrap();
        ctx.insert(StepOutput::RaiseAmount(Section::Ready(RaiseAmount {
            recommended_amount: "$1M".to_string(),
            optimal_amount: "$1.2M".to_string(),
            ..Default::default()
        })))
        .unwrap();

        let view = ctx.runway_view();
        assert_eq!(view.stage(), "Seed");
        assert_eq!(view.raise(), "$1.2M");
    }
}
