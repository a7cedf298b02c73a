//! Request-only heuristics.
//!
//! Used when the generation service cannot supply an upstream value: the
//! profile fallback, and default funding stage, raise amount and investor
//! type for steps whose upstream section is unavailable.

use crate::domain::{IdeaProfile, RequestRecord};

/// Raise amount assumed when no raise recommendation is available
pub const DEFAULT_RAISE_AMOUNT: &str = "$500K";

struct CategoryRule {
    keywords: &'static [&'static str],
    category: &'static str,
    capital_intensity: &'static str,
    burn_profile: &'static str,
    hardware_dependency: &'static str,
    operational_complexity: &'static str,
    regulation_risk: &'static str,
    margin_profile: &'static str,
    team: &'static [&'static str],
}

/// Checked in order; the first rule with a matching keyword wins
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        keywords: &["gpu", "infra", "computing", "cloud", "hardware", "semiconductor", "chip"],
        category: "Infrastructure / Hardware",
        capital_intensity: "Very High",
        burn_profile: "High",
        hardware_dependency: "Very High",
        operational_complexity: "High",
        regulation_risk: "Low",
        margin_profile: "Medium",
        team: &["Infrastructure Engineers", "DevOps", "Hardware Engineers", "Sales Engineers"],
    },
    CategoryRule {
        keywords: &["food", "delivery", "logistics", "restaurant", "grocery", "shipping"],
        category: "Food / Logistics",
        capital_intensity: "High",
        burn_profile: "High",
        hardware_dependency: "Low",
        operational_complexity: "Very High",
        regulation_risk: "Medium",
        margin_profile: "Low",
        team: &["Operations", "Logistics Managers", "Drivers", "Customer Support"],
    },
    CategoryRule {
        keywords: &["saas", "software", "platform", "app", "web", "digital"],
        category: "SaaS / Software",
        capital_intensity: "Low",
        burn_profile: "Medium",
        hardware_dependency: "Low",
        operational_complexity: "Low",
        regulation_risk: "Low",
        margin_profile: "High",
        team: &["Software Engineers", "Product Managers", "Sales", "Marketing"],
    },
    CategoryRule {
        keywords: &["fintech", "finance", "banking", "payment", "lending", "trading", "crypto"],
        category: "FinTech",
        capital_intensity: "Medium",
        burn_profile: "Medium",
        hardware_dependency: "Low",
        operational_complexity: "High",
        regulation_risk: "Very High",
        margin_profile: "Medium",
        team: &["Engineers", "Compliance Officers", "Financial Analysts", "Risk Managers"],
    },
    CategoryRule {
        keywords: &["health", "medical", "biotech", "pharma", "clinical", "patient"],
        category: "Healthcare / BioTech",
        capital_intensity: "High",
        burn_profile: "Medium",
        hardware_dependency: "Medium",
        operational_complexity: "Very High",
        regulation_risk: "Very High",
        margin_profile: "High",
        team: &["Scientists", "Clinicians", "Regulatory Experts", "Engineers"],
    },
    CategoryRule {
        keywords: &["ecommerce", "marketplace", "retail", "shopping", "commerce"],
        category: "E-commerce / Marketplace",
        capital_intensity: "Medium",
        burn_profile: "High",
        hardware_dependency: "Low",
        operational_complexity: "Medium",
        regulation_risk: "Low",
        margin_profile: "Low",
        team: &["Engineers", "Marketing", "Operations", "Customer Support"],
    },
];

/// Derive a low-confidence profile from keywords in the request.
pub fn heuristic_profile(record: &RequestRecord) -> IdeaProfile {
    let text = record.keyword_text();
    let rule = CATEGORY_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| text.contains(k)));

    let business_model = if record.business_model.is_empty() {
        "Not specified".to_string()
    } else {
        record.business_model.clone()
    };

    let mut profile = match rule {
        Some(rule) => IdeaProfile {
            category: rule.category.to_string(),
            capital_intensity: rule.capital_intensity.to_string(),
            burn_profile: rule.burn_profile.to_string(),
            hardware_dependency: rule.hardware_dependency.to_string(),
            operational_complexity: rule.operational_complexity.to_string(),
            regulation_risk: rule.regulation_risk.to_string(),
            margin_profile: rule.margin_profile.to_string(),
            team_requirements: rule.team.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        },
        None => IdeaProfile {
            category: title_case(&record.industry).unwrap_or_else(|| "General".to_string()),
            capital_intensity: "Medium".to_string(),
            burn_profile: "Medium".to_string(),
            hardware_dependency: "Low".to_string(),
            operational_complexity: "Medium".to_string(),
            regulation_risk: "Low".to_string(),
            margin_profile: "Medium".to_string(),
            team_requirements: vec![
                "Founders".to_string(),
                "Engineers".to_string(),
                "Sales".to_string(),
            ],
            ..Default::default()
        },
    };

    profile.business_model = business_model;
    profile.scalability_model = "Standard for category".to_string();
    profile.confidence = "low".to_string();
    profile.notes = "Generated from request keywords; the model profile was unavailable".to_string();
    profile.fill_defaults();
    profile
}

/// Funding stage implied by product stage and monthly revenue
pub fn stage_heuristic(record: &RequestRecord) -> &'static str {
    let revenue = record.monthly_revenue;

    match record.product_stage.as_str() {
        "Idea" => "Pre-Seed",
        "MVP" if revenue < 1_000.0 => "Pre-Seed",
        "Beta" => "Seed",
        "Revenue" if revenue < 10_000.0 => "Seed",
        _ if revenue > 50_000.0 => "Series A",
        _ => "Seed",
    }
}

/// Typical investor types for a funding stage
pub fn investors_for_stage(stage: &str) -> &'static str {
    let stage = stage.to_ascii_lowercase();

    if stage.contains("idea") {
        "Friends & Family, Angel Investors"
    } else if stage.contains("pre-seed") || stage.contains("pre seed") {
        "Angel Investors, Pre-Seed VCs, Accelerators"
    } else if stage.contains("series a") {
        "Institutional VCs, Growth Funds"
    } else if stage.contains("series b") || stage.contains("series c") || stage.contains("growth") {
        "Late-Stage VCs, Private Equity"
    } else {
        "Seed VCs, Angel Networks, Micro VCs"
    }
}

fn title_case(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    let titled = s
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ");
    Some(titled)
}
