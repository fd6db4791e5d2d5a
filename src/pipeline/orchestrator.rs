//! Runs the three gatekeepers in order and gates between them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::agents::{ResearchGatekeeper, SynthesisGatekeeper, ViralGatekeeper};
use crate::error::{LlmError, VectorStoreError};
use crate::llm::{AnthropicProvider, LlmProvider, OpenAiCompatibleProvider};
use crate::stage::Stage;
use crate::state::{PipelineState, StateUpdate};
use crate::vector::{seed_techniques, InMemoryVectorStore, VectorStore};

use super::config::{ConfigError, PipelineConfig, ProviderKind};

/// Key set when a low-confidence gate stops the run.
pub const HALTED_AT_KEY: &str = "pipeline_halted_at";

/// Errors that can occur while assembling a pipeline.
///
/// Running one never fails: stage problems end up in the state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The LLM provider could not be built.
    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    /// The technique library could not be opened.
    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Outcome of one gatekeeper within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub name: String,
    pub confidence: f64,
    pub threshold: f64,
    pub passed: bool,
    /// Errors this gatekeeper and its subagents appended.
    pub errors_added: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

/// Final state plus per-gatekeeper summaries.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub state: PipelineState,
    pub stages: Vec<StageSummary>,
    /// Gatekeeper that stopped the run, when halting is enabled.
    pub halted_at: Option<String>,
}

impl PipelineRun {
    /// Whether every gatekeeper that ran cleared its threshold and none was skipped.
    pub fn all_passed(&self) -> bool {
        self.halted_at.is_none() && self.stages.iter().all(|s| s.passed)
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn summary(&self, name: &str) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Research → viral → synthesis.
pub struct Orchestrator {
    research: ResearchGatekeeper,
    viral: ViralGatekeeper,
    synthesis: SynthesisGatekeeper,
    config: PipelineConfig,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            research: ResearchGatekeeper::new(Arc::clone(&llm)).with_model(&config.model),
            viral: ViralGatekeeper::new(Arc::clone(&llm)).with_model(&config.model),
            synthesis: SynthesisGatekeeper::new(llm, store)
                .with_model(&config.model)
                .with_top_k(config.retrieval_top_k),
            config,
        }
    }

    /// Builds the configured provider and technique library.
    ///
    /// # Errors
    ///
    /// A missing API key, an invalid config or an unreadable library file.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let llm = build_provider(&config)?;
        let store: Arc<dyn VectorStore> = Arc::new(open_library(&config).await?);
        Ok(Self::new(llm, store, config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn gatekeepers(&self) -> [&dyn Stage; 3] {
        [&self.research, &self.viral, &self.synthesis]
    }

    /// Runs every gatekeeper in order over `seed`.
    ///
    /// A gatekeeper below its threshold appends a message; with
    /// `halt_on_low_confidence` it also stops the run.
    pub async fn run(&self, seed: PipelineState) -> PipelineRun {
        let mut state = seed;
        let mut stages = Vec::with_capacity(3);
        let mut halted_at = None;

        for gatekeeper in self.gatekeepers() {
            let name = gatekeeper.name().to_string();
            let threshold = self.config.threshold_for(&name).unwrap_or(0.0);
            let errors_before = state.errors().len();

            tracing::info!(stage = %name, "Running gatekeeper");
            let started = Instant::now();
            state = gatekeeper.run(state).await;
            let duration = started.elapsed();

            let confidence = state.confidence(&name);
            let passed = confidence >= threshold;
            let summary = StageSummary {
                errors_added: state.errors().len().saturating_sub(errors_before),
                name: name.clone(),
                confidence,
                threshold,
                passed,
                duration,
            };
            tracing::info!(
                stage = %name,
                confidence,
                threshold,
                errors = summary.errors_added,
                elapsed_ms = duration.as_millis() as u64,
                "Gatekeeper finished"
            );
            stages.push(summary);

            if !passed {
                tracing::warn!(stage = %name, confidence, threshold, "Below confidence threshold");
                state = state.merge(StateUpdate::new().message(format!(
                    "pipeline: {} confidence {:.2} below threshold {:.2}",
                    name, confidence, threshold
                )));
                if self.config.halt_on_low_confidence {
                    state = state.merge(StateUpdate::new().set(HALTED_AT_KEY, name.as_str()));
                    halted_at = Some(name);
                    break;
                }
            }
        }

        PipelineRun {
            state,
            stages,
            halted_at,
        }
    }
}

/// The LLM provider named by `config`, with its model as the default.
///
/// # Errors
///
/// `ConfigError::MissingEnvVar` when the provider's API key is not set.
pub fn build_provider(config: &PipelineConfig) -> Result<Arc<dyn LlmProvider>, PipelineError> {
    let key_env = config.provider.api_key_env();
    let api_key = std::env::var(key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key_env.to_string()))?;

    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::new(api_key)?.with_default_model(config.model.as_str()))
        }
        ProviderKind::OpenAi => {
            let mut provider =
                OpenAiCompatibleProvider::new(api_key)?.with_default_model(config.model.as_str());
            if let Some(url) = &config.openai_base_url {
                provider = provider.with_base_url(url.as_str());
            }
            Arc::new(provider)
        }
    };
    tracing::debug!(provider = %config.provider, model = %config.model, "LLM provider ready");
    Ok(provider)
}

/// The technique library at `techniques_path`, or the starter library when
/// none is configured or the file holds no techniques.
///
/// # Errors
///
/// IO or JSON errors reading an existing library file.
pub async fn open_library(config: &PipelineConfig) -> Result<InMemoryVectorStore, VectorStoreError> {
    let store = match &config.techniques_path {
        Some(path) => InMemoryVectorStore::open(path).await?,
        None => InMemoryVectorStore::new(),
    };
    if store.is_empty().await {
        seed_techniques(&store).await?;
    }
    Ok(store)
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
