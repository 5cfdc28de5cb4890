//! Payment capability: the single seam between sealing and a payment provider.
//!
//! Both providers implement `PaymentProvider`; which one runs is decided by
//! `PAYMENT_PROVIDER` at startup. Seal and webhook handlers never name a
//! concrete provider.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use thiserror::Error;

use crate::config::{Config, PaymentProviderKind};
use crate::engine::{Context, Status};

pub mod fondy;
pub mod stripe;

pub use fondy::FondyProvider;
pub use stripe::StripeProvider;

const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Credentials or secrets needed for this call are absent.
    #[error("{0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    /// The webhook could not be authenticated. Surfaced as a 400 to the sender.
    #[error("{0}")]
    Signature(String),
}

/// Everything a provider needs to open a checkout for one artifact.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub artifact_code: String,
    pub verify_hash: String,
    pub context: Context,
    pub status: Status,
    pub amount_minor: u32,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub callback_url: String,
}

impl CheckoutRequest {
    pub fn description(&self) -> String {
        format!("Artifact: {} · Status: {}", self.artifact_code, self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
}

/// An authenticated provider notification, reduced to what sealing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        artifact_code: String,
        session_id: String,
    },
    Ignored {
        event_type: String,
    },
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fails when checkout credentials are missing. Checked before anything is persisted.
    fn ensure_configured(&self) -> Result<(), PaymentError>;

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Authenticates a raw webhook delivery and extracts the event.
    /// Any `Err` means the delivery must be rejected without touching state.
    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError>;
}

/// Builds the provider selected by configuration. Missing credentials do not
/// fail here; each call reports them as `PaymentError::NotConfigured`.
pub fn build_provider(config: &Config) -> Result<Arc<dyn PaymentProvider>> {
    let http = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    let provider: Arc<dyn PaymentProvider> = match config.payment_provider {
        PaymentProviderKind::Stripe => Arc::new(StripeProvider::new(
            http,
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
            config.stripe_webhook_tolerance_secs,
        )),
        PaymentProviderKind::Fondy => Arc::new(FondyProvider::new(
            http,
            config.fondy_merchant_id.clone(),
            config.fondy_secret_key.clone(),
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_follows_config() {
        let mut config = Config::for_tests();
        assert_eq!(build_provider(&config).unwrap().name(), "stripe");

        config.payment_provider = PaymentProviderKind::Fondy;
        assert_eq!(build_provider(&config).unwrap().name(), "fondy");
    }

    #[test]
    fn test_checkout_description() {
        let request = CheckoutRequest {
            artifact_code: "ci-ab-cdef0".into(),
            verify_hash: "0123456789abcdef".into(),
            context: Context::Love,
            status: Status::NotNow,
            amount_minor: 500,
            currency: "usd".into(),
            success_url: String::new(),
            cancel_url: String::new(),
            callback_url: String::new(),
        };
        assert_eq!(request.description(), "Artifact: ci-ab-cdef0 · Status: NOT NOW");
    }
}
