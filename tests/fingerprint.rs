//! Fingerprint Integration Tests
//!
//! Equivalent requests must share a cache key; anything that changes the
//! meaning of a request must not.

use finiq::core::{canonical_json, fingerprint};
use finiq::domain::normalize;
use serde_json::json;

fn acme() -> serde_json::Value {
    json!({
        "startupName": "Acme Logistics",
        "oneLineDescription": "Routing software for regional couriers",
        "industry": "Logistics",
        "teamSize": 6,
        "productStage": "Revenue",
        "monthlyRevenue": 12000,
        "growthRate": 15,
        "fundingGoal": 1500000,
    })
}

#[test]
fn test_equivalent_requests_share_fingerprint() {
    let noisy = json!({
        "startup_name": "  Acme   Logistics ",
        "one_line_description": "Routing software\tfor regional couriers",
        "industry": "Logistics\n",
        "team_size": "6",
        "product_stage": "revenue",
        "monthly_revenue": "$12,000",
        "growth_rate": " 15% ",
        "funding_goal": "1,500,000",
        "userId": "user-8812",
        "timestamp": "2026-03-01T10:00:00Z",
        "trace_id": "abc123",
        "remaining_trials": 2,
    });

    let a = fingerprint(&normalize(&acme()), "v1");
    let b = fingerprint(&normalize(&noisy), "v1");

    assert_eq!(a, b);
    assert_eq!(canonical_json(&normalize(&acme())), canonical_json(&normalize(&noisy)));
}

#[test]
fn test_meaningful_changes_alter_fingerprint() {
    let base = fingerprint(&normalize(&acme()), "v1");

    let mut changed = acme();
    changed["monthlyRevenue"] = json!(12001);
    assert_ne!(base, fingerprint(&normalize(&changed), "v1"));

    let mut changed = acme();
    changed["industry"] = json!("Fintech");
    assert_ne!(base, fingerprint(&normalize(&changed), "v1"));
}

#[test]
fn test_fingerprint_is_stable_across_calls() {
    let record = normalize(&acme());
    let first = fingerprint(&record, "v1");

    for _ in 0..10 {
        assert_eq!(fingerprint(&record, "v1"), first);
    }
    assert_eq!(first.as_str().len(), "v1:".len() + 64);
}

#[test]
fn test_key_order_is_irrelevant() {
    let reordered: serde_json::Value = serde_json::from_str(
        r#"{"fundingGoal": 1500000, "growthRate": 15, "monthlyRevenue": 12000,
            "productStage": "Revenue", "teamSize": 6, "industry": "Logistics",
            "oneLineDescription": "Routing software for regional couriers",
            "startupName": "Acme Logistics"}"#,
    )
    .unwrap();

    assert_eq!(
        fingerprint(&normalize(&acme()), "v1"),
        fingerprint(&normalize(&reordered), "v1")
    );
}
