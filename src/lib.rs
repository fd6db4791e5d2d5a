//! docuforge: viral documentary generation with LLM agents.
//!
//! A topic flows through three gatekeepers (research, viral analysis and
//! content synthesis), each of which fans work out to specialist subagents
//! over a shared [`PipelineState`]. The result is exported as a production
//! package of script, visual plan, production notes and citations.

// Core modules
pub mod agents;
pub mod cli;
pub mod error;
pub mod export;
pub mod extraction;
pub mod health;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod scoring;
pub mod stage;
pub mod state;
pub mod vector;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used error types
pub use error::{ExportError, LlmError, StateError, VectorStoreError};

pub use pipeline::{Orchestrator, PipelineConfig, PipelineRun};
pub use stage::Stage;
pub use state::{PipelineState, StateUpdate};
