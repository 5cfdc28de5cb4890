//! Fondy: checkout URLs from a signed request and signed server callbacks.
//!
//! Fondy signs with SHA-1 over `secret|v1|v2|...`, where the values are the
//! non-empty parameters ordered by key name.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, WebhookEvent,
};

const FONDY_API_BASE: &str = "https://pay.fondy.eu";
const ORDER_APPROVED: &str = "approved";
/// Never part of the signed string.
const UNSIGNED_FIELDS: [&str; 2] = ["signature", "response_signature_string"];

pub struct FondyProvider {
    http: Client,
    api_base: String,
    merchant_id: Option<String>,
    secret_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MerchantData {
    artifact_code: String,
    verify_hash: String,
}

#[derive(Debug, Deserialize)]
struct FondyEnvelope {
    response: FondyCheckoutResponse,
}

#[derive(Debug, Deserialize)]
struct FondyCheckoutResponse {
    response_status: String,
    checkout_url: Option<String>,
    error_message: Option<String>,
    error_code: Option<Value>,
}

impl FondyProvider {
    pub fn new(http: Client, merchant_id: Option<String>, secret_key: Option<String>) -> Self {
        Self {
            http,
            api_base: FONDY_API_BASE.to_string(),
            merchant_id,
            secret_key,
        }
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn credentials(&self) -> Result<(&str, &str), PaymentError> {
        match (self.merchant_id.as_deref(), self.secret_key.as_deref()) {
            (Some(merchant_id), Some(secret)) => Ok((merchant_id, secret)),
            _ => Err(PaymentError::NotConfigured(
                "FONDY_MERCHANT_ID and FONDY_SECRET_KEY must be set".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PaymentProvider for FondyProvider {
    fn name(&self) -> &'static str {
        "fondy"
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        self.credentials().map(|_| ())
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let (merchant_id, secret) = self.credentials()?;

        // Fondy rejects reused order ids, and a seal may be retried for the same artifact.
        let order_id = format!("{}_{}", request.artifact_code, Uuid::new_v4().simple());
        let merchant_data = serde_json::to_string(&MerchantData {
            artifact_code: request.artifact_code.clone(),
            verify_hash: request.verify_hash.clone(),
        })
        .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        let mut params: BTreeMap<&str, String> = BTreeMap::from([
            ("order_id", order_id.clone()),
            ("merchant_id", merchant_id.to_string()),
            ("order_desc", request.description()),
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_uppercase()),
            ("response_url", request.success_url.clone()),
            ("server_callback_url", request.callback_url.clone()),
            ("merchant_data", merchant_data),
        ]);
        let signed = signature(secret, params.iter().map(|(k, v)| (*k, v.as_str())));
        params.insert("signature", signed);

        let response = self
            .http
            .post(format!("{}/api/checkout/url/", self.api_base))
            .json(&json!({ "request": params }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: FondyEnvelope = response.json().await?;
        let body = envelope.response;
        if body.response_status != "success" {
            let code = body.error_code.map(|c| c.to_string()).unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: format!(
                    "{} (code {code})",
                    body.error_message.unwrap_or_else(|| "checkout failed".to_string())
                ),
            });
        }

        let checkout_url = body.checkout_url.ok_or_else(|| {
            PaymentError::InvalidResponse("success response has no checkout_url".to_string())
        })?;

        debug!(order_id = %order_id, "Fondy checkout created");

        Ok(CheckoutSession {
            session_id: order_id,
            checkout_url,
        })
    }

    fn parse_webhook(&self, _headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let (merchant_id, secret) = self
            .credentials()
            .map_err(|e| PaymentError::Signature(e.to_string()))?;

        let mut payload: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| PaymentError::Signature(format!("invalid callback payload: {e}")))?;
        // Accept both the flat callback and the `{"response": {...}}` envelope.
        if let Some(Value::Object(inner)) = payload.remove("response") {
            payload = inner;
        }

        let provided = payload
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::Signature("callback has no signature".to_string()))?;

        let fields: Vec<(&str, String)> = payload
            .iter()
            .filter_map(|(k, v)| param_value(v).map(|s| (k.as_str(), s)))
            .collect();
        let provided = hex::decode(provided)
            .map_err(|_| PaymentError::Signature("callback signature is not hex".to_string()))?;
        let expected = signature_digest(secret, fields.iter().map(|(k, v)| (*k, v.as_str())));
        if !bool::from(expected.ct_eq(provided.as_slice())) {
            return Err(PaymentError::Signature(
                "callback signature does not match".to_string(),
            ));
        }

        let field = |key: &str| payload.get(key).and_then(param_value);
        if field("merchant_id").as_deref() != Some(merchant_id) {
            return Err(PaymentError::Signature(
                "callback is addressed to another merchant".to_string(),
            ));
        }

        let order_status = field("order_status").unwrap_or_default();
        if order_status != ORDER_APPROVED {
            return Ok(WebhookEvent::Ignored {
                event_type: format!("order_status:{order_status}"),
            });
        }

        let merchant_data = field("merchant_data")
            .and_then(|raw| serde_json::from_str::<MerchantData>(&raw).ok());
        match (merchant_data, field("order_id")) {
            (Some(data), Some(order_id)) => Ok(WebhookEvent::CheckoutCompleted {
                artifact_code: data.artifact_code,
                session_id: order_id,
            }),
            _ => {
                warn!("Approved Fondy callback without merchant_data or order_id");
                Ok(WebhookEvent::Ignored {
                    event_type: format!("order_status:{order_status}"),
                })
            }
        }
    }
}

/// `sha1("secret|" + non-empty values ordered by key joined with "|")`, lowercase hex.
pub fn signature<'a>(secret: &str, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    hex::encode(signature_digest(secret, params))
}

fn signature_digest<'a>(
    secret: &str,
    params: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<u8> {
    let mut signed: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(k, v)| !v.is_empty() && !UNSIGNED_FIELDS.contains(k))
        .collect();
    signed.sort_by(|a, b| a.0.cmp(b.0));

    let mut parts = Vec::with_capacity(signed.len() + 1);
    parts.push(secret);
    parts.extend(signed.iter().map(|(_, v)| *v));

    Sha1::digest(parts.join("|").as_bytes()).to_vec()
}

/// How a callback value appears in the signed string. `None` for nulls.
fn param_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
