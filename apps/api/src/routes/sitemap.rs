use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::state::AppState;
use crate::verify::page::escape_html;

/// GET /sitemap.xml
/// Lists the public landing page. Verify pages are per-artifact and not indexed.
pub async fn sitemap_handler(State(state): State<AppState>) -> Response {
    let Some(base) = state.config.public_url.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
  <url>\n\
    <loc>{}</loc>\n\
    <lastmod>{}</lastmod>\n\
    <changefreq>daily</changefreq>\n\
    <priority>1.0</priority>\n\
  </url>\n\
</urlset>\n",
        escape_html(base),
        Utc::now().format("%Y-%m-%d"),
    );
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use crate::config::Config;
    use crate::test_support::{app_with, get, send, stripe_app, RecordingPayments};

    #[tokio::test]
    async fn test_sitemap_lists_public_url() {
        let app = stripe_app();
        let (status, body) = send(&app.router, get("/sitemap.xml")).await;
        assert_eq!(status, StatusCode::OK);
        let xml = String::from_utf8(body).unwrap();
        assert!(xml.contains("<loc>https://moment.test</loc>"));
        assert!(xml.contains("<changefreq>daily</changefreq>"));
        assert!(xml.contains("<priority>1.0</priority>"));
    }

    #[tokio::test]
    async fn test_sitemap_and_robots_without_public_url() {
        let mut config = Config::for_tests();
        config.public_url = None;
        let app = app_with(config, Arc::new(RecordingPayments::default()));

        let (status, _) = send(&app.router, get("/sitemap.xml")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, robots) = send(&app.router, get("/robots.txt")).await;
        assert!(!String::from_utf8(robots).unwrap().contains("Sitemap:"));
    }
}
