//! SessionStore — durable write-through holder for the onboarding session.
//!
//! One named record, overwritten wholesale on every mutation so a reload
//! restores the last state. The active process is assumed to be the sole
//! mutator; concurrent writers race with last-write-wins.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;

use super::model::{KycSession, KycStatus, OcrResult, SessionUser, Similarity};

/// Durable backend holding the persisted session record.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn load(&self) -> Result<Option<KycSession>, StorageError>;
    async fn save(&self, session: &KycSession) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
}

/// JSON-file backend.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&self) -> Result<Option<KycSession>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let session = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, session: &KycSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(session)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory backend, used in tests.
#[derive(Default)]
pub struct MemoryBackend {
    record: std::sync::Mutex<Option<KycSession>>,
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<KycSession>, StorageError> {
        Ok(self.record.lock().unwrap().clone())
    }

    async fn save(&self, session: &KycSession) -> Result<(), StorageError> {
        *self.record.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}

/// Write-through session store. Every mutation replaces the whole field,
/// is immediately visible to subsequent reads, and is persisted before
/// the call returns.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    session: RwLock<KycSession>,
}

impl SessionStore {
    /// Restore the last persisted session, or start empty.
    pub async fn load(backend: Arc<dyn StorageBackend>) -> Result<Self, StorageError> {
        let session = backend.load().await?.unwrap_or_default();
        Ok(Self {
            backend,
            session: RwLock::new(session),
        })
    }

    /// Snapshot of the current session.
    pub async fn get(&self) -> KycSession {
        self.session.read().await.clone()
    }

    /// The resolved user id, if any.
    pub async fn user_id(&self) -> Option<String> {
        self.session
            .read()
            .await
            .user_id()
            .map(|id| id.to_string())
    }

    pub async fn set_user(&self, user: SessionUser) -> Result<(), StorageError> {
        self.mutate(|s| s.user = Some(user)).await
    }

    pub async fn set_ocr_result(&self, ocr: OcrResult) -> Result<(), StorageError> {
        self.mutate(|s| s.ocr_result = Some(ocr)).await
    }

    pub async fn set_similarity(&self, similarity: Similarity) -> Result<(), StorageError> {
        self.mutate(|s| s.similarity = Some(similarity)).await
    }

    pub async fn set_kyc_status(&self, status: KycStatus) -> Result<(), StorageError> {
        self.mutate(|s| s.kyc_status = Some(status)).await
    }

    /// Clear all fields atomically and drop the persisted record.
    pub async fn reset(&self) -> Result<(), StorageError> {
        {
            let mut guard = self.session.write().await;
            *guard = KycSession::default();
        }
        self.backend.clear().await
    }

    async fn mutate(&self, f: impl FnOnce(&mut KycSession)) -> Result<(), StorageError> {
        let snapshot = {
            let mut guard = self.session.write().await;
            f(&mut guard);
            guard.clone()
        };
        self.backend.save(&snapshot).await
    }
}
