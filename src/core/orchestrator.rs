//! Main orchestrator for pipeline execution.
//!
//! Coordinates normalization, the cache lookup, sequential step execution,
//! assembly and the cache write for a single request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, field, info, instrument, warn, Span};

use crate::adapters::Adapter;
use crate::cache::CacheStore;
use crate::domain::{normalize, ExecutionLogEntry, Report, Run, RunPhase, StepKind, StepStatus};

use super::assembler::{assemble, Timing};
use super::context::Context;
use super::fingerprint::Fingerprint;
use super::pipeline::Pipeline;
use super::safety::SafetyTracker;
use super::steps::{
    FinancialPriorityStep, FundingStageStep, IdeaUnderstandingStep, IndustrySpecialistStep,
    InvestorTypeStep, RaiseAmountStep, RunwayStep, Step, StepError,
};

/// Main pipeline orchestrator
pub struct Orchestrator {
    adapter: Arc<dyn Adapter>,
    cache: Arc<CacheStore>,
    pipeline: Pipeline,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(adapter: Arc<dyn Adapter>, cache: Arc<CacheStore>, pipeline: Pipeline) -> Self {
        Self {
            adapter,
            cache,
            pipeline,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Cache key a raw request would be stored under
    pub fn fingerprint(&self, raw: &Value) -> Fingerprint {
        Fingerprint::of(&normalize(raw), self.cache.version())
    }

    /// Produce a report for a raw request, served from the cache when possible
    pub async fn run(&self, raw: &Value) -> Result<Report> {
        self.execute(raw, true).await
    }

    /// Produce a fresh report without reading or writing the cache
    pub async fn run_uncached(&self, raw: &Value) -> Result<Report> {
        self.execute(raw, false).await
    }

    #[instrument(skip_all, fields(run_id = field::Empty, fingerprint = field::Empty))]
    async fn execute(&self, raw: &Value, use_cache: bool) -> Result<Report> {
        let mut run = Run::new();
        let started = Instant::now();
        Span::current().record("run_id", field::display(run.id));

        let record = normalize(raw);
        run.advance(RunPhase::Normalized)?;

        let key = Fingerprint::of(&record, self.cache.version());
        Span::current().record("fingerprint", key.short());
        info!(startup = record.display_name(), use_cache, "Starting run");

        let lookup_started = Instant::now();
        let cached = if use_cache {
            self.cache.get(&key).await
        } else {
            None
        };
        run.advance(RunPhase::CacheChecked)?;

        if let Some(mut report) = cached {
            run.advance(RunPhase::CacheHit)?;
            report.mark_cached(lookup_started.elapsed().as_secs_f64());
            run.advance(RunPhase::Done)?;

            info!(
                retrieval_seconds = report.metadata.cache_retrieval_time_seconds,
                original_seconds = report.metadata.execution_time_seconds,
                "Served report from cache"
            );
            return Ok(report);
        }

        run.advance(RunPhase::RunningSteps)?;
        let mut ctx = Context::new(record);
        let mut log = Vec::with_capacity(StepKind::ALL.len());
        let mut tracker = SafetyTracker::new();

        self.run_step::<IdeaUnderstandingStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<IndustrySpecialistStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<FundingStageStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<RaiseAmountStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<InvestorTypeStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<RunwayStep>(&mut ctx, &mut log, &mut tracker).await?;
        self.run_step::<FinancialPriorityStep>(&mut ctx, &mut log, &mut tracker).await?;

        if !ctx.is_complete() {
            anyhow::bail!("Run {} finished with unfilled context slots", run.id);
        }

        run.advance(RunPhase::Assembling)?;
        let timing = Timing {
            execution_time_seconds: started.elapsed().as_secs_f64(),
            finished_at: Utc::now(),
        };
        let report = assemble(&ctx, log, &key, timing);

        if use_cache {
            let write = self.cache.set(&key, &report, self.cache.ttl()).await;
            debug!(?write, "Cache write finished");
        }
        run.advance(RunPhase::Cached)?;
        run.advance(RunPhase::Done)?;

        info!(
            execution_seconds = timing.execution_time_seconds,
            steps = tracker.steps_executed,
            prompt_bytes = tracker.prompt_bytes,
            output_bytes = tracker.output_bytes,
            "Run completed"
        );
        Ok(report)
    }

    /// Execute one step and merge its settled output into the context
    async fn run_step<S: Step>(
        &self,
        ctx: &mut Context,
        log: &mut Vec<ExecutionLogEntry>,
        tracker: &mut SafetyTracker,
    ) -> Result<()> {
        let kind = S::KIND;
        let timeout = self.pipeline.timeout_for(kind);
        let step_start = Instant::now();

        let prompt = S::prompt(&S::view(ctx));
        let reply = self.generate(kind, &prompt, timeout).await;
        let output_bytes = reply.as_ref().map_or(0, |raw| raw.len() as u64);
        tracker.record_step(prompt.len() as u64, output_bytes);

        let result = reply.and_then(|raw| S::parse(&raw, &S::view(ctx)));
        let settled = S::settle(result, ctx.record());
        let duration = step_start.elapsed().as_secs_f64();

        ctx.insert(settled.output)
            .with_context(|| format!("Failed to merge output of step '{}'", kind))?;

        let mut entry = ExecutionLogEntry::new(kind, settled.status, duration);
        match (settled.status, settled.error) {
            (StepStatus::Ok, _) => {
                info!(step = %kind, duration_seconds = duration, "Step completed");
            }
            (StepStatus::Fallback, error) => {
                warn!(step = %kind, duration_seconds = duration, error = ?error, "Step failed, using heuristic output");
                entry.error = error;
            }
            (StepStatus::Failed, error) => {
                error!(step = %kind, duration_seconds = duration, error = ?error, "Step failed, section unavailable");
                entry.error = error;
            }
        }
        log.push(entry);

        Ok(())
    }

    /// One bounded generation call, with prompt and reply size checks
    async fn generate(
        &self,
        kind: StepKind,
        prompt: &str,
        timeout: Duration,
    ) -> std::result::Result<String, StepError> {
        let limits = &self.pipeline.safety_limits;
        limits.validate_prompt(prompt)?;

        let call = self.adapter.execute(kind.key(), prompt, timeout);
        let output = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(StepError::Adapter(format!("{:#}", e))),
            Err(_) => return Err(StepError::Timeout(timeout)),
        };

        limits.validate_output(&output.content)?;
        Ok(output.content)
    }
}
