//! Workflow — the ordered onboarding step machine and its controller.

pub mod controller;
pub mod state;

pub use controller::{LivenessProgress, WorkflowController};
pub use state::WorkflowStep;
