//! Research gatekeeper and its five subagents.

pub mod academic;
pub mod accessibility;
pub mod contrarian;
pub mod gatekeeper;
pub mod historical;
pub mod interdisciplinary;

pub use academic::AcademicSpecialist;
pub use accessibility::AccessibilityTranslator;
pub use contrarian::ContrarianHunter;
pub use gatekeeper::{FindingScore, QualityMetrics, ResearchGatekeeper};
pub use historical::HistoricalMiner;
pub use interdisciplinary::InterdisciplinaryConnector;
