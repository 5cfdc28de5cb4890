use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::engine::{Context, Status};

/// A row of the `artifacts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ArtifactRow {
    pub id: Uuid,
    pub artifact_code: String,
    pub context: String,
    pub status: String,
    pub locked_minute_utc: i64,
    pub locked_at_utc: DateTime<Utc>,
    pub verify_hash: String,
    pub is_sealed: bool,
    pub sealed_at_utc: Option<DateTime<Utc>>,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when an unsealed artifact is first persisted.
/// `verify_hash` and `locked_at_utc` are derived from the other three by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArtifact {
    pub artifact_code: String,
    pub context: Context,
    pub status: Status,
    pub locked_minute_utc: i64,
    pub locked_at_utc: DateTime<Utc>,
    pub verify_hash: String,
}

impl NewArtifact {
    /// An unsealed row as it would be stored.
    pub fn into_row(self, id: Uuid, created_at: DateTime<Utc>) -> ArtifactRow {
        ArtifactRow {
            id,
            artifact_code: self.artifact_code,
            context: self.context.as_str().to_string(),
            status: self.status.as_str().to_string(),
            locked_minute_utc: self.locked_minute_utc,
            locked_at_utc: self.locked_at_utc,
            verify_hash: self.verify_hash,
            is_sealed: false,
            sealed_at_utc: None,
            stripe_session_id: None,
            created_at,
        }
    }

    /// Whether `row` is the same unsealed artifact this input would create.
    pub fn matches(&self, row: &ArtifactRow) -> bool {
        row.artifact_code == self.artifact_code
            && row.verify_hash == self.verify_hash
            && row.context == self.context.as_str()
            && row.status == self.status.as_str()
            && row.locked_minute_utc == self.locked_minute_utc
    }
}
