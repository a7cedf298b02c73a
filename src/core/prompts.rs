//! Prompt templates, one per step.
//!
//! Each template renders the request and the step's upstream view into a
//! single instruction that asks for one JSON object of a fixed shape.

use std::fmt::Write;

use super::context::{
    FundingStageView, IndustryView, InvestorView, PriorityView, ProfileView, RaiseAmountView,
    RunwayView,
};
use crate::domain::{IdeaProfile, IndustryInsights, RequestRecord};

const JSON_ONLY: &str = "Respond with ONLY the JSON object. No markdown, no code fences, no commentary.";

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

fn money(value: f64) -> String {
    if value == 0.0 {
        "N/A".to_string()
    } else {
        format!("${}", value)
    }
}

/// Request fields shared by every prompt
fn startup_block(record: &RequestRecord) -> String {
    let mut out = String::from("STARTUP:\n");
    let _ = writeln!(out, "- Name: {}", or_na(&record.startup_name));
    let _ = writeln!(out, "- One-line description: {}", or_na(&record.one_line_description));
    let _ = writeln!(out, "- Idea: {}", or_na(&record.idea_description));
    let _ = writeln!(out, "- Industry: {}", or_na(&record.industry));
    let _ = writeln!(out, "- Target market: {}", or_na(&record.target_market));
    let _ = writeln!(out, "- Geography: {}", or_na(&record.geography));
    let _ = writeln!(out, "- Team size: {}", record.team_size);
    let _ = writeln!(out, "- Product stage: {}", or_na(&record.product_stage));
    let _ = writeln!(out, "- Monthly revenue: {}", money(record.monthly_revenue));
    let _ = writeln!(out, "- Growth rate: {}%", record.growth_rate);
    let _ = writeln!(out, "- Traction: {}", or_na(&record.traction_summary));
    let _ = writeln!(out, "- Business model: {}", or_na(&record.business_model));
    let _ = writeln!(out, "- Funding goal: {}", money(record.funding_goal));
    let _ = writeln!(out, "- Main financial concern: {}", or_na(&record.main_financial_concern));
    out
}

fn profile_block(profile: Option<&IdeaProfile>) -> String {
    let Some(p) = profile else {
        return "IDEA PROFILE: not available, rely on the startup inputs.\n".to_string();
    };

    format!(
        "IDEA PROFILE:\n- Category: {}\n- Business model: {}\n- Capital intensity: {}\n- Burn profile: {}\n\
         - Hardware dependency: {}\n- Operational complexity: {}\n- Regulation risk: {}\n\
         - Scalability: {}\n- Margin profile: {}\n- Key roles: {}\n- Confidence: {}\n",
        or_na(&p.category),
        or_na(&p.business_model),
        or_na(&p.capital_intensity),
        or_na(&p.burn_profile),
        or_na(&p.hardware_dependency),
        or_na(&p.operational_complexity),
        or_na(&p.regulation_risk),
        or_na(&p.scalability_model),
        or_na(&p.margin_profile),
        if p.team_requirements.is_empty() {
            "N/A".to_string()
        } else {
            p.team_requirements.join(", ")
        },
        or_na(&p.confidence),
    )
}

fn industry_block(industry: Option<&IndustryInsights>) -> String {
    match industry {
        Some(insights) if !insights.bullets.is_empty() => {
            let mut out = format!(
                "INDUSTRY REALITIES ({}, confidence: {}):\n",
                or_na(&insights.industry_label),
                or_na(&insights.confidence)
            );
            for bullet in &insights.bullets {
                let _ = writeln!(out, "- {}", bullet);
            }
            out.push_str("Ground every recommendation in these realities.\n");
            out
        }
        _ => "INDUSTRY REALITIES: not available, use general guidance.\n".to_string(),
    }
}

pub fn idea_understanding(view: &ProfileView<'_>) -> String {
    format!(
        "You are a senior startup analyst. Build a concise structured profile of this startup.\n\n\
         {startup}\n\
         Return JSON:\n\
         {{\"category\": \"short domain label\", \"business_model\": \"how it makes money\", \
         \"capital_intensity\": \"Very High|High|Medium|Low\", \"burn_profile\": \"Very High|High|Medium|Low\", \
         \"hardware_dependency\": \"Very High|High|Medium|Low\", \"operational_complexity\": \"Very High|High|Medium|Low\", \
         \"regulation_risk\": \"Very High|High|Medium|Low\", \"scalability_model\": \"one sentence\", \
         \"margin_profile\": \"Very High|High|Medium|Low\", \"team_requirements\": [\"role\"], \
         \"confidence\": \"high|medium|low\", \"notes\": \"one or two sentences\"}}\n\
         If the input is unclear, still return valid JSON and set confidence to \"low\".\n{json_only}",
        startup = startup_block(view.record),
        json_only = JSON_ONLY,
    )
}

pub fn industry_specialist(view: &IndustryView<'_>) -> String {
    format!(
        "You are an operator who has built companies in this exact niche. List the concrete realities \
         that decide success here: costs, regulations, unit economics, hiring, channels.\n\n\
         {startup}\n{profile}\n\
         Give 5 to 8 specific bullets with numbers where possible. Avoid generic advice such as \
         \"focus on growth\" or \"build a strong team\".\n\
         Return JSON:\n\
         {{\"industry_label\": \"precise niche label\", \"bullets\": [\"specific reality\"], \
         \"confidence\": \"high|medium|low\"}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        json_only = JSON_ONLY,
    )
}

pub fn funding_stage(view: &FundingStageView<'_>) -> String {
    format!(
        "You are a startup finance advisor. Determine the appropriate funding stage.\n\n\
         {startup}\n{profile}\n{industry}\n\
         Stages: Idea Stage, Pre-Seed, Seed, Series A, Series B+, Bootstrapped/Profitable.\n\
         Return JSON:\n\
         {{\"funding_stage\": \"one of the stages\", \"confidence\": \"high|medium|low\", \
         \"rationale\": \"2-3 sentences\", \"stage_characteristics\": \"key indicators\"}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        industry = industry_block(view.industry),
        json_only = JSON_ONLY,
    )
}

pub fn raise_amount(view: &RaiseAmountView<'_>) -> String {
    format!(
        "You are a startup finance advisor. Recommend how much to raise for 18-24 months of runway.\n\n\
         {startup}\n{profile}\n{industry}\n\
         Target funding stage: {stage}\n\n\
         Return JSON:\n\
         {{\"recommended_amount\": \"e.g. $500K-$750K\", \"minimum_viable\": \"lowest sensible amount\", \
         \"optimal_amount\": \"ideal amount\", \"rationale\": \"how the amount was derived\", \
         \"breakdown\": {{\"team_expansion\": \"cost\", \"product_development\": \"cost\", \
         \"marketing_sales\": \"cost\", \"operations_overhead\": \"cost\", \"buffer\": \"contingency\"}}}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        industry = industry_block(view.industry),
        stage = view.stage(),
        json_only = JSON_ONLY,
    )
}

pub fn investor_type(view: &InvestorView<'_>) -> String {
    format!(
        "You are a fundraising advisor. Identify the investors that fit this startup.\n\n\
         {startup}\n{profile}\n{industry}\n\
         Funding stage: {stage}\nRaise amount: {raise}\n\n\
         Return JSON:\n\
         {{\"primary_investor_type\": \"most suitable type\", \"secondary_options\": [\"type\"], \
         \"specific_investors\": [\"fund or angel\"], \"avoid\": [\"type\"], \"rationale\": \"why\", \
         \"target_profile\": \"what to look for\", \"approach_strategy\": \"how to approach\"}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        industry = industry_block(view.industry),
        stage = view.stage(),
        raise = view.raise(),
        json_only = JSON_ONLY,
    )
}

pub fn runway(view: &RunwayView<'_>) -> String {
    format!(
        "You are a startup CFO. Estimate the runway this raise buys.\n\n\
         {startup}\n{profile}\n{industry}\n\
         Funding stage: {stage}\nRaise amount: {raise}\n\n\
         Return JSON:\n\
         {{\"estimated_runway_months\": \"e.g. 12-18\", \"monthly_burn_rate\": \"e.g. $50K-$75K\", \
         \"assumptions\": {{\"team_costs\": \"breakdown\", \"operational_expenses\": \"breakdown\", \
         \"growth_investments\": \"breakdown\"}}, \"revenue_impact\": \"effect of revenue on runway\", \
         \"key_milestones\": [\"milestone\"], \"burn_rate_guidance\": \"advice\"}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        industry = industry_block(view.industry),
        stage = view.stage(),
        raise = view.raise(),
        json_only = JSON_ONLY,
    )
}

pub fn financial_priority(view: &PriorityView<'_>) -> String {
    format!(
        "You are a startup CFO. Rank the financial priorities for the next 6-12 months.\n\n\
         {startup}\n{profile}\n{industry}\n\
         PLAN SO FAR:\n- Funding stage: {stage}\n- Raise amount: {raise}\n- Investor type: {investor}\n\
         - Runway: {runway} months\n\n\
         Return JSON:\n\
         {{\"priorities\": [{{\"priority\": \"specific action\", \"importance\": \"critical|high|medium\", \
         \"rationale\": \"why now\", \"timeline\": \"when\", \"estimated_cost\": \"if applicable\"}}], \
         \"quick_wins\": [\"action\"], \"avoid\": [\"spend to avoid\"], \"success_metrics\": [\"metric\"]}}\n{json_only}",
        startup = startup_block(view.record),
        profile = profile_block(view.profile),
        industry = industry_block(view.industry),
        stage = view.stage(),
        raise = view.raise(),
        investor = view.investor(),
        runway = view.runway_months().unwrap_or("N/A"),
        json_only = JSON_ONLY,
    )
}
