//! Session state — the data model of one onboarding attempt and its
//! durable write-through store.

pub mod model;
pub mod store;

pub use model::{KycSession, KycStatus, OcrResult, Profile, SessionUser, Similarity};
pub use store::{FileBackend, MemoryBackend, SessionStore, StorageBackend};
