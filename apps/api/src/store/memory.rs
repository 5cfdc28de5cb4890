use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::artifact::{ArtifactRow, NewArtifact};
use crate::store::{resolve_existing, ArtifactStore, SealOutcome, StoreError};

/// In-process store keyed by artifact code. Same contract as the Postgres store.
#[derive(Default)]
pub struct MemoryArtifactStore {
    rows: RwLock<HashMap<String, ArtifactRow>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn create_artifact(&self, input: NewArtifact) -> Result<ArtifactRow, StoreError> {
        let mut rows = self.rows.write().await;

        let existing = rows
            .values()
            .find(|r| r.artifact_code == input.artifact_code || r.verify_hash == input.verify_hash)
            .cloned();
        if existing.is_some() {
            return resolve_existing(&input, existing);
        }

        let row = input.into_row(Uuid::new_v4(), Utc::now());
        rows.insert(row.artifact_code.clone(), row.clone());
        Ok(row)
    }

    async fn seal_artifact(
        &self,
        artifact_code: &str,
        payment_session_id: &str,
    ) -> Result<SealOutcome, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(artifact_code)
            .ok_or_else(|| StoreError::NotFound(artifact_code.to_string()))?;

        if row.is_sealed {
            return Ok(SealOutcome::AlreadySealed(row.clone()));
        }

        row.is_sealed = true;
        row.sealed_at_utc = Some(Utc::now());
        row.stripe_session_id = Some(payment_session_id.to_string());
        Ok(SealOutcome::Sealed(row.clone()))
    }

    async fn get_artifact_by_hash(&self, hash: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|r| r.verify_hash == hash)
            .cloned())
    }

    async fn get_artifact_by_code(&self, code: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Ok(self.rows.read().await.get(code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{generate_verify_hash, locked_at, Context, Status};

    fn new_artifact(code: &str) -> NewArtifact {
        NewArtifact {
            artifact_code: code.to_string(),
            context: Context::Career,
            status: Status::Hold,
            locked_minute_utc: 100_000,
            locked_at_utc: locked_at(100_000).unwrap(),
            verify_hash: generate_verify_hash(code, 100_000, Status::Hold),
        }
    }

    #[tokio::test]
    async fn test_create_returns_unsealed_row() {
        let store = MemoryArtifactStore::new();
        let row = store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();
        assert!(!row.is_sealed);
        assert!(row.sealed_at_utc.is_none());
        assert!(row.stripe_session_id.is_none());
        assert_eq!(row.status, "HOLD");
        assert_eq!(row.context, "career");
    }

    #[tokio::test]
    async fn test_identical_retry_returns_existing_row() {
        let store = MemoryArtifactStore::new();
        let first = store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();
        let second = store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_code_reuse_with_other_fields_conflicts() {
        let store = MemoryArtifactStore::new();
        store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();

        let mut other = new_artifact("ci-ab-cdef0");
        other.locked_minute_utc = 100_003;
        other.verify_hash = generate_verify_hash("ci-ab-cdef0", 100_003, Status::Hold);
        let err = store.create_artifact(other).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_seal_is_applied_once() {
        let store = MemoryArtifactStore::new();
        store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();

        let first = store.seal_artifact("ci-ab-cdef0", "cs_1").await.unwrap();
        let SealOutcome::Sealed(sealed) = first else {
            panic!("expected first seal to apply");
        };
        assert!(sealed.is_sealed);

        let second = store.seal_artifact("ci-ab-cdef0", "cs_2").await.unwrap();
        let SealOutcome::AlreadySealed(again) = second else {
            panic!("expected second seal to be a no-op");
        };
        assert_eq!(again.stripe_session_id.as_deref(), Some("cs_1"));
        assert_eq!(again.sealed_at_utc, sealed.sealed_at_utc);
    }

    #[tokio::test]
    async fn test_seal_unknown_code_is_not_found() {
        let store = MemoryArtifactStore::new();
        let err = store.seal_artifact("ci-00-00000", "cs_1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(code) if code == "ci-00-00000"));
    }

    #[tokio::test]
    async fn test_lookup_by_hash() {
        let store = MemoryArtifactStore::new();
        let input = new_artifact("ci-ab-cdef0");
        let hash = input.verify_hash.clone();
        store.create_artifact(input).await.unwrap();

        let found = store.get_artifact_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.artifact_code, "ci-ab-cdef0");
        assert!(store.get_artifact_by_hash("0000000000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sealed_artifact_resubmission_conflicts() {
        let store = MemoryArtifactStore::new();
        store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap();
        store.seal_artifact("ci-ab-cdef0", "cs_1").await.unwrap();
        let err = store.create_artifact(new_artifact("ci-ab-cdef0")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(msg) if msg.contains("already sealed")));
    }
}
