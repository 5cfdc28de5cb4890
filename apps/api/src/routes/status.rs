use axum::{extract::Path, Json};
use serde::Serialize;

use crate::engine::{get_status, locked_at, to_iso, Context, StatusReading};
use crate::errors::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPreview {
    #[serde(flatten)]
    pub reading: StatusReading,
    pub locked_at: Option<String>,
}

/// GET /api/status/:context
/// Preview of the engine for the current minute. Nothing is persisted; the
/// returned code is only kept if the caller goes on to seal it.
pub async fn status_handler(Path(context): Path<String>) -> Result<Json<StatusPreview>, AppError> {
    let context: Context = context
        .parse()
        .map_err(|_| AppError::Validation("Invalid context".to_string()))?;

    let reading = get_status(context);
    let locked_at = locked_at(reading.minute).map(to_iso);
    Ok(Json(StatusPreview { reading, locked_at }))
}
