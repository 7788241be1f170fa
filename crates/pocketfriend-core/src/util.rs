//! Small helpers shared by the gateway, auth and config modules.

/// Trim optional text, mapping blank values to `None`.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate response bodies to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// PostgREST equality filter value (`eq.<value>`).
pub fn eq_filter(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_blank() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" anon-key ".to_string())),
            Some("anon-key".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost:54321"));
        assert!(is_http_url("https://project.supabase.co"));
        assert!(!is_http_url("wss://project.supabase.co"));
    }

    #[test]
    fn compact_text_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(compact_text(&body).len(), 180);
    }

    #[test]
    fn eq_filter_formats_postgrest_operator() {
        assert_eq!(eq_filter("pizza"), "eq.pizza");
        assert_eq!(eq_filter(true), "eq.true");
    }
}
