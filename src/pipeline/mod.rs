//! End-to-end pipeline: configuration and the gatekeeper orchestrator.
//!
//! # Pipeline Flow
//!
//! 1. **Research**: five research subagents plus a quality assessment
//! 2. **Viral**: pattern, hook, engagement and psychology analysis
//! 3. **Synthesis**: technique retrieval, script, visuals and production notes
//!
//! After each gatekeeper its confidence is compared with the configured
//! threshold. A miss is recorded as a message; with
//! `halt_on_low_confidence` the run stops there.
//!
//! # Example
//!
//! ```rust,ignore
//! use docuforge::pipeline::{Orchestrator, PipelineConfig};
//! use docuforge::state::PipelineState;
//!
//! let config = PipelineConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(config).await?;
//! let seed = PipelineState::create(serde_json::json!({
//!     "topic": "Why we procrastinate",
//!     "target_audience": "students",
//!     "video_style": "documentary",
//! }))?;
//! let run = orchestrator.run(seed).await;
//! for stage in &run.stages {
//!     println!("{}: {:.2}", stage.name, stage.confidence);
//! }
//! ```

pub mod config;
pub mod orchestrator;

pub use config::{ConfigError, PipelineConfig, ProviderKind};
pub use orchestrator::{
    build_provider, open_library, Orchestrator, PipelineError, PipelineRun, StageSummary,
    HALTED_AT_KEY,
};
