//! Liveness challenge actions and their ordered sequence.

use serde::{Deserialize, Serialize};

/// A physical action the user is asked to perform on camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAction {
    Blink,
    TurnLeft,
    TurnRight,
}

impl ChallengeAction {
    /// Action name the liveness oracle expects on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Blink => "blink",
            Self::TurnLeft => "left",
            Self::TurnRight => "right",
        }
    }

    /// Instruction text shown to the user for this action.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Blink => "Please blink your eyes",
            Self::TurnLeft => "Turn your head LEFT",
            Self::TurnRight => "Turn your head RIGHT",
        }
    }
}

impl std::fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Ordered list of liveness actions for one onboarding attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSequence {
    actions: Vec<ChallengeAction>,
}

impl Default for ChallengeSequence {
    fn default() -> Self {
        Self::new(vec![
            ChallengeAction::Blink,
            ChallengeAction::TurnLeft,
            ChallengeAction::TurnRight,
        ])
    }
}

impl ChallengeSequence {
    pub fn new(actions: Vec<ChallengeAction>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The action at `index`, or `None` past the end of the sequence.
    pub fn get(&self, index: usize) -> Option<ChallengeAction> {
        self.actions.get(index).copied()
    }
}
