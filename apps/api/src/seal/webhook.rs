use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::payments::WebhookEvent;
use crate::state::AppState;
use crate::store::SealOutcome;

/// POST /api/webhook
///
/// Rejects deliveries that fail authentication with a 400 and no state change.
/// Once a delivery is authenticated the provider always gets a 200: a seal
/// failure is logged under the `seal_failure` target instead of triggering
/// provider retries.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provider = state.payments.name();

    let event = match state.payments.parse_webhook(&headers, &body) {
        Ok(event) => event,
        Err(err) => {
            warn!(provider, "Webhook rejected: {err}");
            return (StatusCode::BAD_REQUEST, format!("Webhook Error: {err}")).into_response();
        }
    };

    match event {
        WebhookEvent::CheckoutCompleted {
            artifact_code,
            session_id,
        } => match state.store.seal_artifact(&artifact_code, &session_id).await {
            Ok(SealOutcome::Sealed(artifact)) => {
                info!(
                    artifact_code = %artifact.artifact_code,
                    session_id = %session_id,
                    provider,
                    "Artifact sealed"
                );
            }
            Ok(SealOutcome::AlreadySealed(artifact)) => {
                info!(
                    artifact_code = %artifact.artifact_code,
                    session_id = %session_id,
                    "Duplicate completion delivery, artifact already sealed"
                );
            }
            Err(err) => {
                error!(
                    target: "seal_failure",
                    artifact_code = %artifact_code,
                    session_id = %session_id,
                    provider,
                    "Failed to seal artifact after verified payment: {err}"
                );
            }
        },
        WebhookEvent::Ignored { event_type } => {
            debug!(provider, event_type = %event_type, "Ignoring webhook event");
        }
    }

    StatusCode::OK.into_response()
}
