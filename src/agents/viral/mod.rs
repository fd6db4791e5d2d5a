//! Viral analysis gatekeeper and its four subagents.

pub mod engagement;
pub mod gatekeeper;
pub mod hooks;
pub mod pattern;
pub mod psychology;

pub use engagement::EngagementOptimizer;
pub use gatekeeper::ViralGatekeeper;
pub use hooks::{HookGenerator, ScoredHook};
pub use pattern::PatternAnalyzer;
pub use psychology::PsychologyDetector;
