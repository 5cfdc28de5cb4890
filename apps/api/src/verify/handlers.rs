use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::{lookup, page, VerifyState};
use crate::engine::to_iso;
use crate::errors::AppError;
use crate::models::artifact::ArtifactRow;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    pub sealed: Option<String>,
}

impl VerifyQuery {
    /// Set by the checkout success redirect. Only the literal `true` counts.
    fn just_paid(&self) -> bool {
        self.sealed.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    pub artifact_code: String,
    pub context: String,
    pub status: String,
    pub locked_minute: i64,
    pub locked_at: String,
    pub sealed_at: Option<String>,
    pub verify_hash: String,
}

impl From<&ArtifactRow> for ArtifactView {
    fn from(row: &ArtifactRow) -> Self {
        Self {
            artifact_code: row.artifact_code.clone(),
            context: row.context.clone(),
            status: row.status.clone(),
            locked_minute: row.locked_minute_utc,
            locked_at: to_iso(row.locked_at_utc),
            sealed_at: row.sealed_at_utc.map(to_iso),
            verify_hash: row.verify_hash.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactView>,
}

/// GET /verify/:hash
pub async fn handle_verify_page(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let result = match lookup(state.store.as_ref(), &hash, query.just_paid()).await {
        Ok(result) => result,
        Err(e) => {
            // Backend errors are never shown on the page.
            error!(verify_hash = %hash, "Verify lookup failed: {e}");
            VerifyState::NotFound
        }
    };
    let status = match result {
        VerifyState::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (status, Html(page::render(&result))).into_response()
}

/// GET /api/verify/:hash
/// Unlike the page, a store failure is reported as an error rather than `not_found`.
pub async fn handle_verify_json(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, AppError> {
    let result = lookup(state.store.as_ref(), &hash, query.just_paid()).await?;
    let artifact = match &result {
        VerifyState::Sealed(row) => Some(ArtifactView::from(row)),
        _ => None,
    };
    Ok(Json(VerifyResponse {
        state: result.label(),
        artifact,
    }))
}
