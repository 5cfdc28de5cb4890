use axum::{extract::State, http::header, response::IntoResponse};

use crate::state::AppState;

/// GET /robots.txt
pub async fn robots_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::from("User-agent: *\nAllow: /\nDisallow: /api/\n");
    if let Some(base) = state.config.public_url.as_deref() {
        body.push_str(&format!("Sitemap: {base}/sitemap.xml\n"));
    }
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}
