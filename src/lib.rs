//! kyc-onboard — client-side KYC onboarding workflow engine.
//!
//! Sequencing, retries, and persistence around an opaque remote
//! verification service: a linear step state machine, a durable session
//! store threading artifacts between steps, and a timed multi-frame
//! liveness capture protocol.

pub mod capture;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod session;
pub mod upload;
pub mod workflow;
