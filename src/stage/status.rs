//! Per-stage execution state machine.
//!
//! ```text
//! Pending -> Validating -> Invalid
//!                       -> CallingLlm -> LlmFailed
//!                                     -> Extracting -> Scoring -> Done
//!                                        Extracting -> CallingLlm
//! ```
//!
//! A gatekeeper re-enters `CallingLlm` from `Extracting` for a follow-up call
//! made after its subagents ran.
//! `Invalid` and `LlmFailed` are terminal but still yield a usable state.

use serde::{Deserialize, Serialize};

/// Where a single stage execution currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Validating,
    /// Required inputs were missing.
    Invalid,
    CallingLlm,
    /// The LLM or vector store call failed.
    LlmFailed,
    Extracting,
    Scoring,
    Done,
}

impl StageStatus {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Invalid | StageStatus::LlmFailed | StageStatus::Done
        )
    }

    /// Returns true if the stage ended without producing scored output.
    pub fn is_failure(&self) -> bool {
        matches!(self, StageStatus::Invalid | StageStatus::LlmFailed)
    }

    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Validating, Invalid)
                | (Validating, CallingLlm)
                | (CallingLlm, LlmFailed)
                | (CallingLlm, Extracting)
                | (Extracting, CallingLlm)
                | (Extracting, Scoring)
                | (Scoring, Done)
        )
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StageStatus::Pending => "pending",
            StageStatus::Validating => "validating",
            StageStatus::Invalid => "invalid",
            StageStatus::CallingLlm => "calling_llm",
            StageStatus::LlmFailed => "llm_failed",
            StageStatus::Extracting => "extracting",
            StageStatus::Scoring => "scoring",
            StageStatus::Done => "done",
        };
        write!(f, "{}", label)
    }
}

/// Records the transitions of one stage run and rejects illegal ones.
#[derive(Debug, Clone)]
pub struct StageTracker {
    stage: String,
    history: Vec<StageStatus>,
}

impl StageTracker {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            history: vec![StageStatus::Pending],
        }
    }

    pub fn status(&self) -> StageStatus {
        self.history
            .last()
            .copied()
            .unwrap_or(StageStatus::Pending)
    }

    pub fn history(&self) -> &[StageStatus] {
        &self.history
    }

    /// Moves to `next` if legal. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: StageStatus) -> bool {
        let current = self.status();
        if !current.can_transition_to(next) {
            tracing::warn!(
                stage = %self.stage,
                from = %current,
                to = %next,
                "Illegal stage transition ignored"
            );
            return false;
        }
        tracing::debug!(stage = %self.stage, from = %current, to = %next, "Stage transition");
        self.history.push(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StageTracker::new("hook");
        for next in [
            StageStatus::Validating,
            StageStatus::CallingLlm,
            StageStatus::Extracting,
            StageStatus::Scoring,
            StageStatus::Done,
        ] {
            assert!(tracker.advance(next));
        }
        assert!(tracker.status().is_terminal());
        assert!(!tracker.status().is_failure());
        assert_eq!(tracker.history().len(), 6);
    }

    #[test]
    fn test_failure_states_are_terminal() {
        assert!(StageStatus::Invalid.is_terminal());
        assert!(StageStatus::LlmFailed.is_terminal());
        for next in [StageStatus::Validating, StageStatus::Done, StageStatus::Scoring] {
            assert!(!StageStatus::Invalid.can_transition_to(next));
            assert!(!StageStatus::LlmFailed.can_transition_to(next));
        }
    }

    #[test]
    fn test_follow_up_call_can_fail() {
        let mut tracker = StageTracker::new("research");
        for next in [
            StageStatus::Validating,
            StageStatus::CallingLlm,
            StageStatus::Extracting,
            StageStatus::CallingLlm,
            StageStatus::LlmFailed,
        ] {
            assert!(tracker.advance(next), "{} rejected", next);
        }
        assert!(tracker.status().is_failure());
        assert!(!StageStatus::Scoring.can_transition_to(StageStatus::CallingLlm));
    }

    #[test]
    fn test_illegal_transition_ignored() {
        let mut tracker = StageTracker::new("hook");
        assert!(!tracker.advance(StageStatus::Done));
        assert_eq!(tracker.status(), StageStatus::Pending);
    }

    #[test]
    fn test_display() {
        assert_eq!(StageStatus::CallingLlm.to_string(), "calling_llm");
        let json = serde_json::to_string(&StageStatus::LlmFailed).expect("serialize");
        assert_eq!(json, "\"llm_failed\"");
    }
}
