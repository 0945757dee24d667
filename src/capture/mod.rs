//! Liveness challenge capture — the ordered action sequence and the
//! timed multi-frame burst engine that drives it.

pub mod challenge;
pub mod engine;

pub use challenge::{ChallengeAction, ChallengeSequence};
pub use engine::{
    CancelHandle, CancelToken, CapturePhase, ChallengeCaptureEngine, ChallengeOutcome, Frame,
    FrameSource, cancel_pair,
};
