//! Artifact store abstraction
//!
//! This module defines the [`ArtifactStore`] trait that storage backends implement.

use async_trait::async_trait;
use bytes::Bytes;
use squash_core::{AppError, ArtifactEntry, ArtifactId, ArtifactKind, ArtifactStat};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact name: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => AppError::NotFound(format!("Artifact {} not found", id)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// What an idempotent delete actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// An artifact moved out of sight for delivery.
///
/// While claimed, the artifact is invisible to `exists`, `read` and other
/// claims. It ends with [`commit_claim`](ArtifactStore::commit_claim) once the
/// bytes are safely sent, or [`release_claim`](ArtifactStore::release_claim)
/// to make it deliverable again.
#[derive(Debug, Clone)]
pub struct Claim {
    pub kind: ArtifactKind,
    pub id: ArtifactId,
    /// Entry name the artifact is held under while claimed.
    pub entry: String,
    pub data: Bytes,
}

/// Artifact store abstraction
///
/// Operations on different ids may run concurrently. For the same id, the only
/// concurrency guarantee needed is that [`delete`](ArtifactStore::delete) is
/// idempotent and [`claim`](ArtifactStore::claim) succeeds for at most one
/// caller at a time.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `data` under a freshly generated id. The artifact becomes visible
    /// only once every byte is on disk.
    async fn create(
        &self,
        kind: ArtifactKind,
        extension: Option<&str>,
        data: &[u8],
    ) -> StorageResult<ArtifactId>;

    /// Check if an artifact exists
    async fn exists(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<bool>;

    /// Read size and creation time from storage.
    async fn stat(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<ArtifactStat>;

    /// Read an artifact without removing it.
    async fn read(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes>;

    /// Claim an artifact and read it. Of several concurrent callers at most one
    /// gets the claim; the rest get [`StorageError::NotFound`].
    async fn claim(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Claim>;

    /// Delete a claimed artifact for good. Idempotent.
    async fn commit_claim(&self, claim: &Claim) -> StorageResult<()>;

    /// Put a claimed artifact back under its id.
    async fn release_claim(&self, claim: &Claim) -> StorageResult<()>;

    /// Claim, read and delete in one step, for callers that only need the
    /// bytes in memory. A failed delete is logged and left to the reaper.
    async fn take(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<Bytes> {
        let claim = self.claim(kind, id).await?;
        if let Err(e) = self.commit_claim(&claim).await {
            tracing::error!(
                artifact_id = %claim.id,
                error = %e,
                "Failed to delete delivered artifact, leaving it to the reaper"
            );
        }
        Ok(claim.data)
    }

    /// Delete an artifact. Deleting an absent artifact is not an error.
    async fn delete(&self, kind: ArtifactKind, id: &ArtifactId) -> StorageResult<DeleteOutcome> {
        self.remove_entry(kind, id.as_str()).await
    }

    /// Enumerate every file in a staging area, artifacts and in-flight files alike.
    async fn list(&self, kind: ArtifactKind) -> StorageResult<Vec<ArtifactEntry>>;

    /// Delete a listed entry by file name. Idempotent like [`delete`](ArtifactStore::delete).
    async fn remove_entry(&self, kind: ArtifactKind, name: &str) -> StorageResult<DeleteOutcome>;
}
