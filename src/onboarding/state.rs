//! Wizard state machine: tracks phase, step and the draft profile.

use serde::{Deserialize, Serialize};

use super::model::TraderProfile;

/// Number of questions in the wizard.
pub const TOTAL_STEPS: usize = 9;

/// Index of the terminal question.
pub const LAST_STEP: usize = TOTAL_STEPS - 1;

/// The fixed, non-reorderable question sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    TraderType,
    RiskLevel,
    RiskReward,
    PortfolioStyle,
    MarketUniverse,
    Liquidity,
    MaxTrades,
    AdvancedSettings,
    ExplanationStyle,
}

impl WizardStep {
    pub const ALL: [WizardStep; TOTAL_STEPS] = [
        WizardStep::TraderType,
        WizardStep::RiskLevel,
        WizardStep::RiskReward,
        WizardStep::PortfolioStyle,
        WizardStep::MarketUniverse,
        WizardStep::Liquidity,
        WizardStep::MaxTrades,
        WizardStep::AdvancedSettings,
        WizardStep::ExplanationStyle,
    ];

    pub fn from_index(index: usize) -> Option<WizardStep> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

/// Lifecycle of one wizard instance.
///
/// Loading → Editing ⇄ Completing → Completed. `Loading` may also go straight
/// to `Completed` when a finished profile is hydrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    #[default]
    Loading,
    Editing,
    Completing,
    Completed,
}

impl WizardPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: WizardPhase) -> bool {
        use WizardPhase::*;
        matches!(
            (self, target),
            (Loading, Editing)
                | (Loading, Completed)
                | (Editing, Completing)
                | (Completing, Completed)
                | (Completing, Editing)
        )
    }

    /// Whether this phase is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Loading => "loading",
            Self::Editing => "editing",
            Self::Completing => "completing",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// What a forward move did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMove {
    /// Moved to the given step index.
    Moved(usize),
    /// Already on the last step; moving on means committing.
    AtLastStep,
    /// Not editable (loading, completing or completed); nothing changed.
    Ignored,
}

/// Whether a commit may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStart {
    Started,
    AlreadyCompleted,
    InFlight,
    NotLoaded,
    NotAtFinalStep(usize),
}

/// In-memory wizard state, owned by a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub phase: WizardPhase,
    pub step_index: usize,
    pub draft: TraderProfile,
    /// Ratchet: once true, never reset by the wizard.
    pub is_completed: bool,
    /// Last load/save failure, shown as a non-blocking notice.
    pub last_error: Option<String>,
    /// The local marker claims a completed onboarding that the remote store
    /// has not confirmed. Informational only.
    pub completion_hint: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            phase: WizardPhase::default(),
            step_index: 0,
            draft: TraderProfile::default(),
            is_completed: false,
            last_error: None,
            completion_hint: false,
        }
    }
}

impl WizardState {
    fn transition(&mut self, target: WizardPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            tracing::warn!(from = %self.phase, to = %target, "Rejected wizard transition");
            return false;
        }
        self.phase = target;
        true
    }

    pub fn current_step(&self) -> WizardStep {
        WizardStep::from_index(self.step_index).unwrap_or(WizardStep::TraderType)
    }

    pub fn is_editable(&self) -> bool {
        self.phase == WizardPhase::Editing
    }

    /// Leave `Loading` with either a hydrated profile or defaults.
    pub fn finish_loading(&mut self, draft: Option<TraderProfile>, completed: bool) {
        let target = if completed {
            WizardPhase::Completed
        } else {
            WizardPhase::Editing
        };
        if !self.transition(target) {
            return;
        }
        if let Some(draft) = draft {
            self.draft = draft;
        }
        if completed {
            self.is_completed = true;
            self.step_index = LAST_STEP;
        } else {
            self.step_index = 0;
        }
    }

    /// Move forward one step. The last step is left to `begin_commit`.
    pub fn advance_step(&mut self) -> StepMove {
        if !self.is_editable() {
            return StepMove::Ignored;
        }
        if self.step_index < LAST_STEP {
            self.step_index += 1;
            StepMove::Moved(self.step_index)
        } else {
            StepMove::AtLastStep
        }
    }

    /// Move back one step. Returns whether the index changed.
    pub fn retreat_step(&mut self) -> bool {
        if !self.is_editable() || self.step_index == 0 {
            return false;
        }
        self.step_index -= 1;
        true
    }

    /// Claim the commit slot. Only `Editing` on the last step may start one.
    pub fn begin_commit(&mut self) -> CommitStart {
        match self.phase {
            WizardPhase::Completed => CommitStart::AlreadyCompleted,
            WizardPhase::Completing => CommitStart::InFlight,
            WizardPhase::Loading => CommitStart::NotLoaded,
            WizardPhase::Editing if self.step_index < LAST_STEP => {
                CommitStart::NotAtFinalStep(self.step_index)
            }
            WizardPhase::Editing => {
                self.transition(WizardPhase::Completing);
                CommitStart::Started
            }
        }
    }

    pub fn commit_succeeded(&mut self) {
        if self.transition(WizardPhase::Completed) {
            self.is_completed = true;
            self.last_error = None;
            self.completion_hint = false;
        }
    }

    /// Return to the last step with the draft untouched.
    pub fn commit_failed(&mut self, reason: String) {
        if self.transition(WizardPhase::Editing) {
            self.step_index = LAST_STEP;
            self.last_error = Some(reason);
        }
    }
}
