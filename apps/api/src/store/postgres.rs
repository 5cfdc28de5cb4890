use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::artifact::{ArtifactRow, NewArtifact};
use crate::store::{resolve_existing, ArtifactStore, SealOutcome, StoreError};

/// Artifact store backed by the `artifacts` table in PostgreSQL.
#[derive(Clone)]
pub struct PgArtifactStore {
    pool: PgPool,
}

impl PgArtifactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn create_artifact(&self, input: NewArtifact) -> Result<ArtifactRow, StoreError> {
        let inserted = sqlx::query_as::<_, ArtifactRow>(
            r#"
            INSERT INTO artifacts
                (id, artifact_code, context, status, locked_minute_utc, locked_at_utc, verify_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.artifact_code)
        .bind(input.context.as_str())
        .bind(input.status.as_str())
        .bind(input.locked_minute_utc)
        .bind(input.locked_at_utc)
        .bind(&input.verify_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row);
        }

        debug!(artifact_code = %input.artifact_code, "Insert collided, checking existing row");
        let existing = sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts WHERE artifact_code = $1 OR verify_hash = $2 LIMIT 1",
        )
        .bind(&input.artifact_code)
        .bind(&input.verify_hash)
        .fetch_optional(&self.pool)
        .await?;

        resolve_existing(&input, existing)
    }

    async fn seal_artifact(
        &self,
        artifact_code: &str,
        payment_session_id: &str,
    ) -> Result<SealOutcome, StoreError> {
        // Conditional on is_sealed so concurrent deliveries cannot overwrite the first seal.
        let sealed = sqlx::query_as::<_, ArtifactRow>(
            r#"
            UPDATE artifacts
            SET is_sealed = TRUE, sealed_at_utc = NOW(), stripe_session_id = $2
            WHERE artifact_code = $1 AND is_sealed = FALSE
            RETURNING *
            "#,
        )
        .bind(artifact_code)
        .bind(payment_session_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = sealed {
            return Ok(SealOutcome::Sealed(row));
        }

        match self.get_artifact_by_code(artifact_code).await? {
            Some(row) => Ok(SealOutcome::AlreadySealed(row)),
            None => Err(StoreError::NotFound(artifact_code.to_string())),
        }
    }

    async fn get_artifact_by_hash(&self, hash: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ArtifactRow>("SELECT * FROM artifacts WHERE verify_hash = $1")
                .bind(hash)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_artifact_by_code(&self, code: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ArtifactRow>("SELECT * FROM artifacts WHERE artifact_code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

/// Run against a disposable database:
/// `DATABASE_URL=postgres://localhost/ci_moment_test cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use crate::engine::{generate_artifact_code, generate_verify_hash, locked_at, status_for, Context};

    async fn store() -> PgArtifactStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        PgArtifactStore::new(create_pool(&url, 2).await.unwrap())
    }

    fn new_artifact(code: &str, minute: i64) -> NewArtifact {
        let status = status_for(minute, Context::Love);
        NewArtifact {
            artifact_code: code.to_string(),
            context: Context::Love,
            status,
            locked_minute_utc: minute,
            locked_at_utc: locked_at(minute).unwrap(),
            verify_hash: generate_verify_hash(code, minute, status),
        }
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_insert_collision_resolves_against_existing_row() {
        let store = store().await;
        let code = generate_artifact_code();

        let first = store.create_artifact(new_artifact(&code, 100_000)).await.unwrap();
        assert!(!first.is_sealed);
        assert_eq!(first.status, status_for(100_000, Context::Love).as_str());

        let retry = store.create_artifact(new_artifact(&code, 100_000)).await.unwrap();
        assert_eq!(retry.id, first.id);

        let err = store.create_artifact(new_artifact(&code, 100_003)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_conditional_update_seals_once() {
        let store = store().await;
        let code = generate_artifact_code();
        store.create_artifact(new_artifact(&code, 100_000)).await.unwrap();

        let SealOutcome::Sealed(sealed) = store.seal_artifact(&code, "cs_1").await.unwrap() else {
            panic!("expected first seal to apply");
        };
        assert!(sealed.is_sealed);
        assert!(sealed.sealed_at_utc.is_some());

        let SealOutcome::AlreadySealed(again) = store.seal_artifact(&code, "cs_2").await.unwrap() else {
            panic!("expected second seal to be a no-op");
        };
        assert_eq!(again.stripe_session_id.as_deref(), Some("cs_1"));
        assert_eq!(again.sealed_at_utc, sealed.sealed_at_utc);

        let by_hash = store
            .get_artifact_by_hash(&sealed.verify_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_hash.id, sealed.id);

        let err = store.create_artifact(new_artifact(&code, 100_000)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(msg) if msg.contains("already sealed")));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_seal_unknown_code_is_not_found() {
        let store = store().await;
        let err = store.seal_artifact("ci-zz-unknown", "cs_1").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
