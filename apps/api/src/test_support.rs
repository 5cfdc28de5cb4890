//! Router-level test harness: in-memory store plus a recording payment provider.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use reqwest::Client;
use tower::ServiceExt;

use crate::config::Config;
use crate::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, StripeProvider, WebhookEvent,
};
use crate::models::artifact::{ArtifactRow, NewArtifact};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{ArtifactStore, MemoryArtifactStore, SealOutcome, StoreError};

pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Records checkout requests; webhooks are never routed to it.
#[derive(Default)]
pub struct RecordingPayments {
    pub requests: Mutex<Vec<CheckoutRequest>>,
    pub fail_with: Option<u16>,
    pub unconfigured: bool,
}

#[async_trait]
impl PaymentProvider for RecordingPayments {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.unconfigured {
            return Err(PaymentError::NotConfigured("STRIPE_SECRET_KEY not set".to_string()));
        }
        Ok(())
    }

    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(status) = self.fail_with {
            return Err(PaymentError::Api {
                status,
                message: "upstream unavailable".to_string(),
            });
        }
        Ok(CheckoutSession {
            session_id: format!("cs_{}", request.artifact_code),
            checkout_url: format!("https://checkout.test/{}", request.artifact_code),
        })
    }

    fn parse_webhook(&self, _: &HeaderMap, _: &[u8]) -> Result<WebhookEvent, PaymentError> {
        Err(PaymentError::Signature("recording provider has no webhooks".to_string()))
    }
}

/// Every call fails as if the database were unreachable.
pub struct FailingStore;

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn create_artifact(&self, _: NewArtifact) -> Result<ArtifactRow, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn seal_artifact(&self, _: &str, _: &str) -> Result<SealOutcome, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get_artifact_by_hash(&self, _: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn get_artifact_by_code(&self, _: &str) -> Result<Option<ArtifactRow>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryArtifactStore>,
}

pub fn app_with(config: Config, payments: Arc<dyn PaymentProvider>) -> TestApp {
    let store = Arc::new(MemoryArtifactStore::new());
    let state = AppState {
        config,
        store: store.clone(),
        payments,
    };
    TestApp {
        router: build_router(state),
        store,
    }
}

/// Router over an arbitrary store with the Stripe verifier.
pub fn app_with_store(store: Arc<dyn ArtifactStore>) -> Router {
    build_router(AppState {
        config: Config::for_tests(),
        store,
        payments: Arc::new(stripe_provider()),
    })
}

fn stripe_provider() -> StripeProvider {
    StripeProvider::new(
        Client::new(),
        Some("sk_test_123".to_string()),
        Some(WEBHOOK_SECRET.to_string()),
        300,
    )
}

/// App whose provider is the real Stripe verifier with `WEBHOOK_SECRET`.
pub fn stripe_app() -> TestApp {
    app_with(Config::for_tests(), Arc::new(stripe_provider()))
}

/// As `stripe_app`, with checkout calls sent to `api_base` (a mock server).
pub fn stripe_app_at(api_base: &str) -> TestApp {
    app_with(
        Config::for_tests(),
        Arc::new(stripe_provider().with_api_base(api_base)),
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
