//! Content synthesis gatekeeper and its four subagents.

pub mod gatekeeper;
pub mod production;
pub mod retrieval;
pub mod script;
pub mod visual;

pub use gatekeeper::SynthesisGatekeeper;
pub use production::ProductionNotesGenerator;
pub use retrieval::RetrievalAgent;
pub use script::ScriptWriter;
pub use visual::VisualArchitect;
