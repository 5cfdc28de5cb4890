pub mod health;
pub mod robots;
pub mod sitemap;
pub mod status;

use axum::{
    routing::{get, post},
    Router,
};

use crate::seal::{handlers as seal, webhook};
use crate::state::AppState;
use crate::verify::handlers as verify;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/robots.txt", get(robots::robots_handler))
        .route("/sitemap.xml", get(sitemap::sitemap_handler))
        // Status Engine preview
        .route("/api/status/:context", get(status::status_handler))
        // Seal lifecycle
        .route("/api/seal", post(seal::handle_seal))
        .route("/api/webhook", post(webhook::handle_webhook))
        // Verification
        .route("/verify/:hash", get(verify::handle_verify_page))
        .route("/api/verify/:hash", get(verify::handle_verify_json))
        .with_state(state)
}
