//! Pipeline definition.
//!
//! The step set is closed and the order is fixed (see [`StepKind::ALL`]).
//! What can vary per deployment is each step's generation parameters and
//! timeout, supplied as overrides under `steps:` in the config file.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::safety::SafetyLimits;
use crate::domain::StepKind;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Tuned defaults per step: low temperature for classification,
    /// higher for open-ended planning.
    pub fn default_for(kind: StepKind) -> Self {
        let (temperature, max_tokens) = match kind {
            StepKind::IdeaUnderstanding => (0.1, 1024),
            StepKind::IndustrySpecialist => (0.4, 1536),
            StepKind::FundingStage => (0.3, 1024),
            StepKind::RaiseAmount => (0.3, 1024),
            StepKind::InvestorType => (0.5, 1536),
            StepKind::Runway => (0.3, 1536),
            StepKind::FinancialPriority => (0.6, 2048),
        };
        Self {
            temperature,
            max_tokens,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

/// Per-step overrides from the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOverride {
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A single step in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Which step this is
    pub kind: StepKind,

    /// Sampling parameters for the generation call
    pub params: GenerationParams,

    /// Override timeout for this step (uses safety_limits.step_timeout_seconds if not set)
    pub timeout_seconds: Option<u64>,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            params: GenerationParams::default_for(kind),
            timeout_seconds: None,
        }
    }

    /// Get the effective timeout for this step
    pub fn timeout(&self, limits: &SafetyLimits) -> Duration {
        let seconds = self.timeout_seconds.unwrap_or(limits.step_timeout_seconds);
        Duration::from_secs(seconds)
    }

    fn apply(&mut self, overrides: &StepOverride) {
        if let Some(timeout) = overrides.timeout_seconds {
            self.timeout_seconds = Some(timeout);
        }
        if let Some(temperature) = overrides.temperature {
            self.params.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            self.params.max_tokens = max_tokens;
        }
    }
}

/// The complete pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Safety limits for this pipeline
    #[serde(default)]
    pub safety_limits: SafetyLimits,

    /// Ordered list of steps to execute
    pub steps: Vec<Step>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard(SafetyLimits::default())
    }
}

impl Pipeline {
    /// The fixed seven-step sequence with default parameters
    pub fn standard(safety_limits: SafetyLimits) -> Self {
        Self {
            safety_limits,
            steps: StepKind::ALL.into_iter().map(Step::new).collect(),
        }
    }

    /// Apply per-step overrides keyed by step name
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, StepOverride>) -> Result<Self> {
        for (name, step_override) in overrides {
            let kind = StepKind::from_key(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown step '{}' in step overrides", name))?;

            if let Some(step) = self.steps.iter_mut().find(|s| s.kind == kind) {
                step.apply(step_override);
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        let kinds: Vec<StepKind> = self.steps.iter().map(|s| s.kind).collect();
        if kinds != StepKind::ALL {
            anyhow::bail!(
                "Pipeline steps must be exactly {:?} in order, got {:?}",
                StepKind::ALL,
                kinds
            );
        }

        if self.safety_limits.step_timeout_seconds == 0 {
            anyhow::bail!("Default step timeout must be greater than zero");
        }

        for step in &self.steps {
            if !(0.0..=2.0).contains(&step.params.temperature) {
                anyhow::bail!(
                    "Step '{}' has temperature {} outside 0.0..=2.0",
                    step.kind,
                    step.params.temperature
                );
            }
            if step.params.max_tokens == 0 {
                anyhow::bail!("Step '{}' has max_tokens 0", step.kind);
            }
            if step.timeout_seconds == Some(0) {
                anyhow::bail!("Step '{}' has a zero timeout", step.kind);
            }
        }

        Ok(())
    }

    /// Get a step by kind
    pub fn get_step(&self, kind: StepKind) -> Option<&Step> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Effective timeout for a step
    pub fn timeout_for(&self, kind: StepKind) -> Duration {
        self.get_step(kind)
            .map(|s| s.timeout(&self.safety_limits))
            .unwrap_or_else(|| Duration::from_secs(self.safety_limits.step_timeout_seconds))
    }

    /// Generation parameters keyed by step name
    pub fn params_by_action(&self) -> BTreeMap<String, GenerationParams> {
        self.steps
            .iter()
            .map(|s| (s.kind.key().to_string(), s.params))
            .collect()
    }
}
