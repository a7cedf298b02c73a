//! Pipeline Integration Tests
//!
//! End-to-end runs through the orchestrator with a scripted generation
//! adapter and a file-backed cache in a temp directory.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use finiq::adapters::{Adapter, AdapterOutput};
use finiq::cache::{CacheStore, FileBackend};
use finiq::core::{Orchestrator, Pipeline, StepOverride};
use finiq::domain::{ProfileSection, Report, StepKind, StepStatus};
use serde_json::{json, Value};
use tempfile::TempDir;

/// What the scripted service does for one step
#[derive(Clone)]
enum Script {
    Reply(String),
    Fail,
    Hang,
}

/// Generation adapter that answers from a per-step script
struct ScriptedAdapter {
    scripts: HashMap<String, Script>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn new() -> Self {
        let replies = [
            (
                StepKind::IdeaUnderstanding,
                json!({
                    "category": "Logistics SaaS",
                    "business_model": "Per-seat subscription",
                    "capital_intensity": "Low",
                    "team_requirements": ["Backend Engineers", "Account Executives"],
                    "confidence": "high",
                }),
            ),
            (
                StepKind::IndustrySpecialist,
                json!({
                    "industry_label": "Last-mile routing software",
                    "bullets": [
                        "Route density above 20 stops per hour decides courier margins",
                        "Carrier integrations take 4-6 weeks each to certify",
                        "Mid-market shippers churn when onboarding exceeds 30 days",
                    ],
                    "confidence": "high",
                }),
            ),
            (
                StepKind::FundingStage,
                json!({
                    "funding_stage": "Seed",
                    "confidence": "high",
                    "rationale": "Paying customers and 15% monthly growth.",
                }),
            ),
            (
                StepKind::RaiseAmount,
                json!({
                    "recommended_amount": "$1.5M",
                    "minimum_viable": "$1M",
                    "optimal_amount": "$2M",
                    "rationale": "18 months of runway at planned hiring",
                    "breakdown": {"team_expansion": "$900K", "buffer": "$150K"},
                }),
            ),
            (
                StepKind::InvestorType,
                json!({
                    "primary_investor_type": "Seed VCs",
                    "secondary_options": ["Logistics angels"],
                    "rationale": "Sector-focused seed funds know the sales cycle",
                }),
            ),
            (
                StepKind::Runway,
                json!({"estimated_runway_months": 18, "monthly_burn_rate": "$85K"}),
            ),
            (
                StepKind::FinancialPriority,
                json!({
                    "priorities": [
                        {"priority": "Close two enterprise pilots", "importance": "critical"},
                        "Hire a part-time controller",
                    ],
                    "quick_wins": ["Annual prepay discount"],
                }),
            ),
        ];

        let scripts = replies
            .into_iter()
            .map(|(kind, reply)| (kind.key().to_string(), Script::Reply(reply.to_string())))
            .collect();

        Self {
            scripts,
            latency: Duration::from_millis(20),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_script(mut self, kind: StepKind, script: Script) -> Self {
        self.scripts.insert(kind.key().to_string(), script);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, action: &str, _input: &str, _timeout: Duration) -> Result<AdapterOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;

        match self.scripts.get(action) {
            Some(Script::Reply(reply)) => Ok(AdapterOutput::new(reply.clone())),
            Some(Script::Fail) => anyhow::bail!("service unavailable"),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                anyhow::bail!("hung call returned")
            }
            None => anyhow::bail!("no script for '{}'", action),
        }
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

fn acme() -> Value {
    json!({
        "startupName": "Acme Logistics",
        "oneLineDescription": "Routing software for regional couriers",
        "industry": "Logistics",
        "teamSize": 6,
        "productStage": "Revenue",
        "monthlyRevenue": 12000,
        "growthRate": 15,
        "fundingGoal": 1500000,
        "userId": "user-8812",
        "timestamp": "2026-03-01T10:00:00Z",
    })
}

fn orchestrator(dir: &TempDir, adapter: Arc<ScriptedAdapter>, pipeline: Pipeline) -> Orchestrator {
    let cache = CacheStore::new(
        None,
        Arc::new(FileBackend::new(dir.path())),
        "v1",
        Duration::from_secs(3600),
    );
    Orchestrator::new(adapter, Arc::new(cache), pipeline)
}

/// Zero out every timing field so two runs can be compared
fn without_timing(mut report: Report) -> Report {
    report.metadata.execution_time_seconds = 0.0;
    report.metadata.timestamp = Utc.timestamp_opt(0, 0).unwrap();
    for entry in &mut report.metadata.execution_log {
        entry.duration_seconds = 0.0;
    }
    report
}

#[tokio::test]
async fn test_acme_miss_then_hit() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new());
    let orchestrator = orchestrator(&dir, adapter.clone(), Pipeline::default());

    let fresh = orchestrator.run(&acme()).await.unwrap();
    assert!(!fresh.metadata.cached);
    assert_eq!(fresh.metadata.steps_executed, StepKind::ALL.to_vec());
    assert!(fresh
        .metadata
        .execution_log
        .iter()
        .all(|e| e.status == StepStatus::Ok && e.error.is_none()));
    assert_eq!(adapter.calls(), 7);
    assert_eq!(
        fresh.summary,
        "Based on the analysis, Acme Logistics should target Seed stage funding of $1.5M \
         from Seed VCs. This will provide approximately 18 months of runway to achieve key milestones."
    );

    let hit = orchestrator.run(&acme()).await.unwrap();
    assert!(hit.metadata.cached);
    assert_eq!(adapter.calls(), 7);

    let retrieval = hit.metadata.cache_retrieval_time_seconds.unwrap();
    let original = hit.metadata.original_execution_time_seconds.unwrap();
    assert_eq!(original, fresh.metadata.execution_time_seconds);
    assert_eq!(hit.metadata.execution_time_seconds, fresh.metadata.execution_time_seconds);
    assert!(retrieval < original);

    assert_eq!(hit.funding_stage, fresh.funding_stage);
    assert_eq!(hit.financial_priority, fresh.financial_priority);
    assert_eq!(hit.metadata.fingerprint, fresh.metadata.fingerprint);
}

/// Drop the annotations a cache hit adds, leaving the stored report
fn as_stored(mut report: Report) -> Report {
    report.metadata.cached = false;
    report.metadata.cache_retrieval_time_seconds = None;
    report.metadata.original_execution_time_seconds = None;
    report
}

#[tokio::test]
async fn test_cached_report_equals_fresh_report() {
    let garbled_profile = Script::Reply("Profile: logistics, probably.".to_string());
    let adapters = [
        ScriptedAdapter::new(),
        ScriptedAdapter::new().with_script(StepKind::IdeaUnderstanding, garbled_profile),
    ];

    let mut sources = Vec::new();
    for adapter in adapters {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(adapter), Pipeline::default());

        let fresh = orchestrator.run(&acme()).await.unwrap();
        let hit = orchestrator.run(&acme()).await.unwrap();
        assert!(hit.metadata.cached);

        let source = match fresh.idea_understanding.ready() {
            Some(ProfileSection::Model(_)) => "model",
            Some(ProfileSection::Heuristic { .. }) => "heuristic",
            None => panic!("profile section missing"),
        };
        assert_eq!(as_stored(hit), fresh, "{} profile run", source);
        sources.push(source);
    }
    assert_eq!(sources, ["model", "heuristic"]);
}

#[tokio::test]
async fn test_equivalent_request_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new());
    let orchestrator = orchestrator(&dir, adapter.clone(), Pipeline::default());

    orchestrator.run(&acme()).await.unwrap();

    let mut reworded = acme();
    reworded["startupName"] = json!("  Acme    Logistics");
    reworded["monthlyRevenue"] = json!("$12,000");
    reworded["userId"] = json!("someone-else");

    let report = orchestrator.run(&reworded).await.unwrap();
    assert!(report.metadata.cached);
    assert_eq!(adapter.calls(), 7);
}

#[tokio::test]
async fn test_uncached_rerun_is_identical_except_timing() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new());
    let orchestrator = orchestrator(&dir, adapter.clone(), Pipeline::default());

    let first = orchestrator.run_uncached(&acme()).await.unwrap();
    let second = orchestrator.run_uncached(&acme()).await.unwrap();

    assert!(!second.metadata.cached);
    assert_eq!(adapter.calls(), 14);
    assert_eq!(without_timing(first), without_timing(second));

    // Nothing was written
    assert_eq!(orchestrator.cache().stats().await.fallback_entry_count, 0);
}

#[tokio::test]
async fn test_profile_failure_falls_back_to_heuristic() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(
        ScriptedAdapter::new().with_script(
            StepKind::IdeaUnderstanding,
            Script::Reply("I'm sorry, I can't produce JSON today.".to_string()),
        ),
    );
    let orchestrator = orchestrator(&dir, adapter, Pipeline::default());

    let report = orchestrator.run(&acme()).await.unwrap();
    let log = &report.metadata.execution_log;

    assert_eq!(log[0].status, StepStatus::Fallback);
    assert!(log[0].error.as_deref().unwrap().contains("no JSON object"));
    assert!(log[1..].iter().all(|e| e.status == StepStatus::Ok));

    match report.idea_understanding.ready() {
        Some(ProfileSection::Heuristic { profile, .. }) => {
            assert_eq!(profile.category, "Food / Logistics");
            assert_eq!(profile.confidence, "low");
        }
        other => panic!("expected heuristic profile, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_step_leaves_placeholder_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new().with_script(StepKind::InvestorType, Script::Fail));
    let orchestrator = orchestrator(&dir, adapter, Pipeline::default());

    let report = orchestrator.run(&acme()).await.unwrap();
    let log = &report.metadata.execution_log;

    assert_eq!(log.len(), 7);
    assert_eq!(log[4].step, StepKind::InvestorType);
    assert_eq!(log[4].status, StepStatus::Failed);
    assert!(log[4].error.as_deref().unwrap().contains("service unavailable"));

    assert!(!report.investor_type.is_ready());
    let placeholder = serde_json::to_value(&report.investor_type).unwrap();
    assert_eq!(placeholder["unavailable"], true);

    assert!(report.runway.is_ready());
    assert!(report.financial_priority.is_ready());
    assert!(report.summary.contains("from N/A."));
}

#[tokio::test]
async fn test_step_timeout_is_a_step_failure() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new().with_script(StepKind::Runway, Script::Hang));

    let mut overrides = BTreeMap::new();
    overrides.insert(
        "runway".to_string(),
        StepOverride {
            timeout_seconds: Some(1),
            ..Default::default()
        },
    );
    let pipeline = Pipeline::default().with_overrides(&overrides).unwrap();
    let orchestrator = orchestrator(&dir, adapter, pipeline);

    let report = orchestrator.run(&acme()).await.unwrap();
    let runway = &report.metadata.execution_log[5];

    assert_eq!(runway.step, StepKind::Runway);
    assert_eq!(runway.status, StepStatus::Failed);
    assert!(runway.error.as_deref().unwrap().contains("timed out"));
    assert!(runway.duration_seconds < 5.0);
    assert!(report.financial_priority.is_ready());
    assert!(report.summary.contains("approximately N/A months"));
}

#[tokio::test]
async fn test_concurrent_identical_misses_both_compute() {
    let dir = TempDir::new().unwrap();
    let adapter = Arc::new(ScriptedAdapter::new());
    let orchestrator = orchestrator(&dir, adapter.clone(), Pipeline::default());

    let request = acme();
    let (a, b) = tokio::join!(orchestrator.run(&request), orchestrator.run(&request));
    let (a, b) = (a.unwrap(), b.unwrap());

    // No request coalescing: both runs call the service
    assert_eq!(adapter.calls(), 14);
    assert!(!a.metadata.cached && !b.metadata.cached);
    assert_eq!(a.metadata.fingerprint, b.metadata.fingerprint);

    let after = orchestrator.run(&request).await.unwrap();
    assert!(after.metadata.cached);
}

#[tokio::test]
async fn test_unwritable_cache_recomputes_every_run() {
    let dir = TempDir::new().unwrap();
    // A regular file where the cache directory should be
    let blocked = dir.path().join("not-a-dir");
    std::fs::write(&blocked, "").unwrap();

    let adapter = Arc::new(ScriptedAdapter::new());
    let cache = CacheStore::new(
        None,
        Arc::new(FileBackend::new(&blocked)),
        "v1",
        Duration::from_secs(3600),
    );
    let orchestrator = Orchestrator::new(adapter.clone(), Arc::new(cache), Pipeline::default());

    let first = orchestrator.run(&acme()).await.unwrap();
    let second = orchestrator.run(&acme()).await.unwrap();

    assert!(!first.metadata.cached && !second.metadata.cached);
    assert_eq!(adapter.calls(), 14);
}
