//! Authentication utilities for API requests

/// Add a bearer token to an HTTP request when one is configured.
///
/// Requests without a token go out unauthenticated; the gateway answers
/// with 401 and the caller surfaces that as an authentication failure.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_token: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_token {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}
