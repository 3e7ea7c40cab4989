//! Small helpers for config values, HTTP bodies and timestamps.

/// Longest slice of a response body carried into an error message
const ERROR_EXCERPT_CHARS: usize = 180;

/// Trim a config value, treating blank input as unset.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

/// Whether `value` carries an `http` or `https` scheme.
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(*scheme))
}

/// First few characters of a remote error body, trimmed.
pub fn error_excerpt(body: &str) -> String {
    body.trim().chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Milliseconds since the Unix epoch; every stored timestamp uses this unit.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
