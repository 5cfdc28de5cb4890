use chrono::{DateTime, Utc};

use super::VerifyState;

const STYLE: &str = "body{margin:0;background:#0a0a0a;color:#fff;font-family:monospace;\
min-height:100vh;display:flex;flex-direction:column;align-items:center;justify-content:center;gap:1rem}\
.rows{display:flex;flex-direction:column;gap:.5rem}\
.muted{color:#888;font-size:.85rem}.faint{color:#555;font-size:.7rem}";

/// `2024-01-01 00:00:00.000 UTC`
pub fn format_locked_at(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render(state: &VerifyState) -> String {
    let body = match state {
        VerifyState::Sealed(row) => format!(
            "<div class=\"rows\">\
<div>Issued: YES</div>\
<div>Artifact: {}</div>\
<div>Status: {}</div>\
<div>Locked at: {}</div>\
</div>",
            escape_html(&row.artifact_code),
            escape_html(&row.status),
            format_locked_at(row.locked_at_utc),
        ),
        VerifyState::Pending => "<div class=\"muted\">Sealing your moment…</div>\
<div class=\"faint\">Payment received. Refresh in a few seconds.</div>"
            .to_string(),
        VerifyState::NotFound => "<div>Artifact not found</div>".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<meta name=\"robots\" content=\"noindex\">\
<title>Ci Moment · Verify</title><style>{STYLE}</style></head>\
<body>{body}</body></html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::locked_at;
    use crate::models::artifact::ArtifactRow;
    use uuid::Uuid;

    fn sealed_row(code: &str) -> ArtifactRow {
        let at = locked_at(28_401_120).unwrap();
        ArtifactRow {
            id: Uuid::new_v4(),
            artifact_code: code.to_string(),
            context: "career".to_string(),
            status: "HOLD".to_string(),
            locked_minute_utc: 28_401_120,
            locked_at_utc: at,
            verify_hash: "0123456789abcdef".to_string(),
            is_sealed: true,
            sealed_at_utc: Some(at),
            stripe_session_id: Some("cs_1".to_string()),
            created_at: at,
        }
    }

    #[test]
    fn test_locked_at_format() {
        let at = locked_at(28_401_120).unwrap();
        assert_eq!(format_locked_at(at), "2024-01-01 00:00:00.000 UTC");
    }

    #[test]
    fn test_sealed_page_lists_record() {
        let html = render(&VerifyState::Sealed(sealed_row("ci-ab-cdef0")));
        assert!(html.contains("Issued: YES"));
        assert!(html.contains("Artifact: ci-ab-cdef0"));
        assert!(html.contains("Status: HOLD"));
        assert!(html.contains("Locked at: 2024-01-01 00:00:00.000 UTC"));
    }

    #[test]
    fn test_pending_and_not_found_pages() {
        let pending = render(&VerifyState::Pending);
        assert!(pending.contains("Sealing your moment…"));
        assert!(pending.contains("Payment received. Refresh in a few seconds."));
        assert!(!pending.contains("Issued"));

        let missing = render(&VerifyState::NotFound);
        assert!(missing.contains("Artifact not found"));
    }

    #[test]
    fn test_stored_text_is_escaped() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
        let html = render(&VerifyState::Sealed(sealed_row("<script>")));
        assert!(html.contains("Artifact: &lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
