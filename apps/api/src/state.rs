use std::sync::Arc;

use crate::config::Config;
use crate::payments::PaymentProvider;
use crate::store::ArtifactStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Postgres in production; swapped for the in-memory store in tests.
    pub store: Arc<dyn ArtifactStore>,
    /// Selected by `PAYMENT_PROVIDER`.
    pub payments: Arc<dyn PaymentProvider>,
}
