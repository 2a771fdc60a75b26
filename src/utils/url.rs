//! URL utilities for consistent gateway endpoint construction

/// Normalize a base URL by removing trailing slashes
///
/// ```
/// use chatline::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://gw.example.com/api/"), "https://gw.example.com/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path without doubled slashes
///
/// ```
/// use chatline::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://gw.example.com/api/", "/terminal/sessions"),
///     "https://gw.example.com/api/terminal/sessions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Check that an identifier can be placed in a single path segment.
pub fn is_valid_path_segment(segment: &str) -> bool {
    !segment.trim().is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        && segment != "."
        && segment != ".."
}
