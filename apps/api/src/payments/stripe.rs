//! Stripe Checkout: hosted checkout sessions and signed `checkout.session.completed` events.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, WebhookEvent,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const SIGNATURE_HEADER: &str = "stripe-signature";
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const PRODUCT_NAME: &str = "Ci Moment Seal";

type HmacSha256 = Hmac<Sha256>;

pub struct StripeProvider {
    http: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    tolerance_secs: i64,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

impl StripeProvider {
    pub fn new(
        http: Client,
        secret_key: Option<String>,
        webhook_secret: Option<String>,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            http,
            api_base: STRIPE_API_BASE.to_string(),
            secret_key,
            webhook_secret,
            tolerance_secs,
        }
    }

    fn secret_key(&self) -> Result<&str, PaymentError> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| PaymentError::NotConfigured("STRIPE_SECRET_KEY not set".to_string()))
    }

    /// Points the client at another API host (a local mock in tests).
    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        self.secret_key().map(|_| ())
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let secret_key = self.secret_key()?;

        let amount = request.amount_minor.to_string();
        let description = request.description();
        let form: [(&str, &str); 13] = [
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", request.currency.as_str()),
            ("line_items[0][price_data][product_data][name]", PRODUCT_NAME),
            ("line_items[0][price_data][product_data][description]", description.as_str()),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][quantity]", "1"),
            ("metadata[artifact_code]", request.artifact_code.as_str()),
            ("metadata[verify_hash]", request.verify_hash.as_str()),
            ("client_reference_id", request.artifact_code.as_str()),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("metadata[context]", request.context.as_str()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: StripeSession = response.json().await?;
        let checkout_url = session.url.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("checkout session {} has no url", session.id))
        })?;

        debug!(session_id = %session.id, artifact_code = %request.artifact_code, "Stripe checkout session created");

        Ok(CheckoutSession {
            session_id: session.id,
            checkout_url,
        })
    }

    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let secret = self.webhook_secret.as_deref().ok_or_else(|| {
            PaymentError::Signature("STRIPE_WEBHOOK_SECRET is not configured".to_string())
        })?;
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PaymentError::Signature("No stripe-signature header value was provided".to_string())
            })?;

        verify_signature(body, header, secret, Utc::now().timestamp(), self.tolerance_secs)?;

        let event: StripeEvent = serde_json::from_slice(body)
            .map_err(|e| PaymentError::InvalidResponse(format!("invalid event payload: {e}")))?;

        if event.event_type != CHECKOUT_COMPLETED {
            return Ok(WebhookEvent::Ignored {
                event_type: event.event_type,
            });
        }

        let object = &event.data.object;
        let session_id = object.get("id").and_then(Value::as_str);
        let artifact_code = object
            .get("metadata")
            .and_then(|m| m.get("artifact_code"))
            .and_then(Value::as_str);

        match (artifact_code, session_id) {
            (Some(code), Some(id)) => Ok(WebhookEvent::CheckoutCompleted {
                artifact_code: code.to_string(),
                session_id: id.to_string(),
            }),
            _ => {
                warn!("Stripe {CHECKOUT_COMPLETED} event without artifact_code metadata or session id");
                Ok(WebhookEvent::Ignored {
                    event_type: event.event_type,
                })
            }
        }
    }
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`):
/// HMAC-SHA256 over `"<t>.<payload>"`, at least one `v1` must match, and `t`
/// must be within `tolerance_secs` of `now_unix`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> Result<(), PaymentError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = Some(value);
        } else if let Some(value) = part.strip_prefix("v1=") {
            signatures.push(value);
        }
    }

    let (timestamp_raw, timestamp) = timestamp
        .and_then(|raw| raw.parse::<i64>().ok().map(|t| (raw, t)))
        .ok_or_else(|| {
            PaymentError::Signature(
                "Unable to extract timestamp and signatures from header".to_string(),
            )
        })?;
    if signatures.is_empty() {
        return Err(PaymentError::Signature(
            "No signatures found with expected scheme v1".to_string(),
        ));
    }
    if (now_unix - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::Signature(
            "Timestamp outside the tolerance zone".to_string(),
        ));
    }

    let matched = signatures.iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp_raw.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::Signature(
            "No signatures found matching the expected signature for payload".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) fn sign_for_tests(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
