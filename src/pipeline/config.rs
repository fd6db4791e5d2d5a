//! Pipeline configuration.
//!
//! Defaults suit a local run against the Anthropic API. Every field can be
//! overridden from the environment (a `.env` file is loaded first by the
//! binary) and then again by CLI flags.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::agents::synthesis::retrieval::DEFAULT_TOP_K;
use crate::stage::DEFAULT_MODEL;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Which hosted model API the stages talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    /// Environment variable holding this provider's key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => crate::llm::providers::anthropic::ANTHROPIC_API_KEY_ENV,
            ProviderKind::OpenAi => crate::llm::providers::openai::OPENAI_API_KEY_ENV,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" | "openai-compatible" => Ok(ProviderKind::OpenAi),
            other => Err(ConfigError::InvalidValue {
                key: "DOCUFORGE_PROVIDER".to_string(),
                message: format!("unknown provider '{}', expected anthropic or openai", other),
            }),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Configuration for the orchestrator and the CLI around it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // LLM settings
    pub provider: ProviderKind,
    /// Model used by every stage.
    pub model: String,
    /// Base URL for the OpenAI-compatible provider.
    pub openai_base_url: Option<String>,

    // Gate thresholds
    pub research_threshold: f64,
    pub viral_threshold: f64,
    pub synthesis_threshold: f64,
    /// Stop after the first gatekeeper that lands below its threshold.
    pub halt_on_low_confidence: bool,

    // Retrieval
    pub retrieval_top_k: usize,
    /// JSON technique library loaded into the vector store.
    pub techniques_path: Option<PathBuf>,

    // Output
    pub output_dir: PathBuf,
    /// Directories the health check expects to exist.
    pub required_dirs: Vec<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: DEFAULT_MODEL.to_string(),
            openai_base_url: None,

            research_threshold: 0.7,
            viral_threshold: 0.75,
            synthesis_threshold: 0.85,
            halt_on_low_confidence: false,

            retrieval_top_k: DEFAULT_TOP_K,
            techniques_path: None,

            output_dir: PathBuf::from("output"),
            required_dirs: vec![PathBuf::from("output"), PathBuf::from("data")],
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DOCUFORGE_PROVIDER`: `anthropic` or `openai` (default: anthropic)
    /// - `DOCUFORGE_MODEL`: model id for every stage
    /// - `OPENAI_BASE_URL`: base URL for the OpenAI-compatible provider
    /// - `DOCUFORGE_RESEARCH_THRESHOLD`: research gate (default: 0.7)
    /// - `DOCUFORGE_VIRAL_THRESHOLD`: viral gate (default: 0.75)
    /// - `DOCUFORGE_SYNTHESIS_THRESHOLD`: synthesis gate (default: 0.85)
    /// - `DOCUFORGE_HALT_ON_LOW_CONFIDENCE`: stop at a failed gate (default: false)
    /// - `DOCUFORGE_RETRIEVAL_TOP_K`: techniques retrieved (default: 8)
    /// - `DOCUFORGE_TECHNIQUES_PATH`: JSON technique library
    /// - `DOCUFORGE_OUTPUT_DIR`: production package root (default: output)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(val) = lookup("DOCUFORGE_PROVIDER") {
            config.provider = val.parse()?;
        }
        if let Some(val) = lookup("DOCUFORGE_MODEL") {
            config.model = val;
        }
        if let Some(val) = lookup("OPENAI_BASE_URL") {
            config.openai_base_url = Some(val);
        }

        if let Some(val) = lookup("DOCUFORGE_RESEARCH_THRESHOLD") {
            config.research_threshold = parse_env_value(&val, "DOCUFORGE_RESEARCH_THRESHOLD")?;
        }
        if let Some(val) = lookup("DOCUFORGE_VIRAL_THRESHOLD") {
            config.viral_threshold = parse_env_value(&val, "DOCUFORGE_VIRAL_THRESHOLD")?;
        }
        if let Some(val) = lookup("DOCUFORGE_SYNTHESIS_THRESHOLD") {
            config.synthesis_threshold = parse_env_value(&val, "DOCUFORGE_SYNTHESIS_THRESHOLD")?;
        }
        if let Some(val) = lookup("DOCUFORGE_HALT_ON_LOW_CONFIDENCE") {
            config.halt_on_low_confidence =
                parse_env_bool(&val, "DOCUFORGE_HALT_ON_LOW_CONFIDENCE")?;
        }

        if let Some(val) = lookup("DOCUFORGE_RETRIEVAL_TOP_K") {
            config.retrieval_top_k = parse_env_value(&val, "DOCUFORGE_RETRIEVAL_TOP_K")?;
        }
        if let Some(val) = lookup("DOCUFORGE_TECHNIQUES_PATH") {
            config.techniques_path = Some(PathBuf::from(val));
        }
        if let Some(val) = lookup("DOCUFORGE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(&val);
            if let Some(first) = config.required_dirs.first_mut() {
                *first = PathBuf::from(val);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("research_threshold", self.research_threshold),
            ("viral_threshold", self.viral_threshold),
            ("synthesis_threshold", self.synthesis_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be between 0.0 and 1.0",
                    name
                )));
            }
        }

        if self.retrieval_top_k == 0 {
            return Err(ConfigError::ValidationFailed(
                "retrieval_top_k must be greater than 0".to_string(),
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_dir cannot be empty".to_string(),
            ));
        }

        if let Some(url) = &self.openai_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationFailed(format!(
                    "openai_base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Builder method to set the provider.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    pub fn with_research_threshold(mut self, threshold: f64) -> Self {
        self.research_threshold = threshold;
        self
    }

    pub fn with_viral_threshold(mut self, threshold: f64) -> Self {
        self.viral_threshold = threshold;
        self
    }

    pub fn with_synthesis_threshold(mut self, threshold: f64) -> Self {
        self.synthesis_threshold = threshold;
        self
    }

    /// Builder method to stop the run at the first failed gate.
    pub fn with_halt_on_low_confidence(mut self, halt: bool) -> Self {
        self.halt_on_low_confidence = halt;
        self
    }

    pub fn with_retrieval_top_k(mut self, top_k: usize) -> Self {
        self.retrieval_top_k = top_k;
        self
    }

    pub fn with_techniques_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.techniques_path = Some(path.into());
        self
    }

    /// Builder method to set the output directory.
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_required_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.required_dirs = dirs;
        self
    }

    /// Threshold for the named gatekeeper, if it has one.
    pub fn threshold_for(&self, gatekeeper: &str) -> Option<f64> {
        match gatekeeper {
            "research" => Some(self.research_threshold),
            "viral" => Some(self.viral_threshold),
            "synthesis" => Some(self.synthesis_threshold),
            _ => None,
        }
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
