use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::engine::{generate_verify_hash, locked_at, status_for, Context, Status};
use crate::errors::AppError;
use crate::models::artifact::NewArtifact;
use crate::payments::CheckoutRequest;
use crate::state::AppState;

/// Body of `POST /api/seal`. Every field is optional here so that absence and
/// wrong types produce the same 400 rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealRequest {
    pub artifact_code: Option<String>,
    pub context: Option<String>,
    pub status: Option<String>,
    pub locked_minute: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealResponse {
    pub checkout_url: String,
}

/// A seal request that passed every check, with the server-derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSeal {
    pub artifact_code: String,
    pub context: Context,
    pub status: Status,
    pub locked_minute: i64,
    pub locked_at: DateTime<Utc>,
}

/// Codes are client-generated and stored verbatim; only their size is bounded.
const MAX_ARTIFACT_CODE_LEN: usize = 64;

fn missing_parameters() -> AppError {
    AppError::Validation("Missing required parameters".to_string())
}

/// Runs the checks in order and names the first one that fails.
pub fn validate_seal(request: SealRequest) -> Result<ValidatedSeal, AppError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (Some(artifact_code), Some(context), Some(status), Some(locked_minute)) = (
        non_empty(request.artifact_code),
        non_empty(request.context),
        non_empty(request.status),
        request.locked_minute,
    ) else {
        return Err(missing_parameters());
    };

    let context: Context = context
        .parse()
        .map_err(|_| AppError::Validation("Invalid context".to_string()))?;
    let status: Status = status
        .parse()
        .map_err(|_| AppError::Validation("Invalid status".to_string()))?;
    if artifact_code.len() > MAX_ARTIFACT_CODE_LEN {
        return Err(AppError::Validation("Invalid artifact code".to_string()));
    }
    let locked_at = locked_at(locked_minute)
        .ok_or_else(|| AppError::Validation("Locked minute is out of range".to_string()))?;
    if status != status_for(locked_minute, context) {
        return Err(AppError::Validation(
            "Status does not match engine output".to_string(),
        ));
    }

    Ok(ValidatedSeal {
        artifact_code,
        context,
        status,
        locked_minute,
        locked_at,
    })
}

/// POST /api/seal
///
/// Re-derives the status server-side, persists the unsealed artifact and
/// returns the provider's checkout URL.
pub async fn handle_seal(
    State(state): State<AppState>,
    payload: Result<Json<SealRequest>, JsonRejection>,
) -> Result<Json<SealResponse>, AppError> {
    let Json(request) = payload.map_err(|_| missing_parameters())?;
    let seal = validate_seal(request)?;

    // Configuration is checked before anything is written.
    let base_url = state
        .config
        .public_url
        .as_deref()
        .ok_or_else(|| AppError::Configuration("PUBLIC_URL not set".to_string()))?;
    state.payments.ensure_configured()?;

    let verify_hash = generate_verify_hash(&seal.artifact_code, seal.locked_minute, seal.status);
    let artifact = state
        .store
        .create_artifact(NewArtifact {
            artifact_code: seal.artifact_code.clone(),
            context: seal.context,
            status: seal.status,
            locked_minute_utc: seal.locked_minute,
            locked_at_utc: seal.locked_at,
            verify_hash: verify_hash.clone(),
        })
        .await?;

    info!(
        artifact_code = %artifact.artifact_code,
        context = %seal.context,
        status = %seal.status,
        locked_minute = seal.locked_minute,
        "Artifact persisted, opening checkout"
    );

    let checkout = CheckoutRequest {
        artifact_code: seal.artifact_code,
        verify_hash: verify_hash.clone(),
        context: seal.context,
        status: seal.status,
        amount_minor: state.config.seal_price_cents,
        currency: state.config.seal_currency.clone(),
        success_url: format!("{base_url}/verify/{verify_hash}?sealed=true"),
        cancel_url: format!("{base_url}?cancelled=true"),
        callback_url: format!("{base_url}/api/webhook"),
    };

    let session = state
        .payments
        .create_checkout(&checkout)
        .await
        .map_err(|e| {
            // The artifact stays unsealed; an identical retry reuses it.
            error!(
                artifact_code = %checkout.artifact_code,
                provider = state.payments.name(),
                "Checkout creation failed: {e}"
            );
            e
        })?;

    Ok(Json(SealResponse {
        checkout_url: session.checkout_url,
    }))
}
