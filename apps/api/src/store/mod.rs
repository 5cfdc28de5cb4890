//! Artifact Store: persistence contract for the `artifacts` table.
//!
//! `AppState` holds an `Arc<dyn ArtifactStore>`: Postgres in production,
//! the in-memory store in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::artifact::{ArtifactRow, NewArtifact};

pub mod memory;
pub mod postgres;

pub use memory::MemoryArtifactStore;
pub use postgres::PgArtifactStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact carries the given code.
    #[error("artifact {0} not found")]
    NotFound(String),

    /// The code or hash is already taken by a different artifact.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result of a seal attempt. Sealing is a one-way flag, so a repeated
/// delivery reports the row as it was first sealed.
#[derive(Debug, Clone, PartialEq)]
pub enum SealOutcome {
    Sealed(ArtifactRow),
    AlreadySealed(ArtifactRow),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Inserts an unsealed artifact and returns the stored row.
    ///
    /// Re-submitting an identical unsealed artifact returns the existing row,
    /// which lets a user retry sealing after an upstream failure.
    async fn create_artifact(&self, input: NewArtifact) -> Result<ArtifactRow, StoreError>;

    /// Marks the artifact sealed, recording the time and payment session id
    /// on the first call only.
    async fn seal_artifact(
        &self,
        artifact_code: &str,
        payment_session_id: &str,
    ) -> Result<SealOutcome, StoreError>;

    /// `Ok(None)` when no artifact has this hash.
    async fn get_artifact_by_hash(&self, hash: &str) -> Result<Option<ArtifactRow>, StoreError>;

    async fn get_artifact_by_code(&self, code: &str) -> Result<Option<ArtifactRow>, StoreError>;
}

/// Shared create-collision rule for both backends.
pub(crate) fn resolve_existing(
    input: &NewArtifact,
    existing: Option<ArtifactRow>,
) -> Result<ArtifactRow, StoreError> {
    match existing {
        Some(row) if !row.is_sealed && input.matches(&row) => Ok(row),
        Some(row) if row.is_sealed && input.matches(&row) => Err(StoreError::Conflict(format!(
            "Artifact {} is already sealed",
            row.artifact_code
        ))),
        _ => Err(StoreError::Conflict(format!(
            "Artifact code {} or its verify hash is already in use",
            input.artifact_code
        ))),
    }
}
