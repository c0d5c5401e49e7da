use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Extract authentication token from request
///
/// Supports two token sources:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>` (for browser WebSocket connections)
fn extract_token(request: &Request) -> Result<String, AuthError> {
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            tracing::debug!("Token extracted from Authorization header");
            return Ok(token.trim().to_string());
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                tracing::debug!("Token extracted from query parameter");
                return Ok(value.to_string());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}

/// Constant-time comparison of a presented token against the configured key.
pub fn token_matches(token: &str, expected: &str) -> bool {
    token.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Bearer-key authentication for the dashboard API
///
/// Disabled when no `DIALER_API_KEY` is configured. Otherwise every request
/// must present the key in the Authorization header or the `token` query
/// parameter; anything else is rejected with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.config.auth_api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let token = extract_token(&request).inspect_err(|e| {
        tracing::warn!(method = %method, path = %path, error = %e, "Missing credentials");
    })?;

    if token_matches(&token, expected) {
        tracing::debug!(method = %method, path = %path, "API key authentication successful");
        Ok(next.run(request).await)
    } else {
        tracing::warn!(method = %method, path = %path, "API key authentication failed");
        Err(AuthError::Unauthorized("Invalid API key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_token_from_header() {
        let req = request("/api/calls", Some("Bearer secret"));
        assert_eq!(extract_token(&req).unwrap(), "secret");
    }

    #[test]
    fn test_extract_token_from_query() {
        let req = request("/api/events?token=abc%20def", None);
        assert_eq!(extract_token(&req).unwrap(), "abc def");
    }

    #[test]
    fn test_header_takes_priority_over_query() {
        let req = request("/api/events?token=query", Some("Bearer header"));
        assert_eq!(extract_token(&req).unwrap(), "header");
    }

    #[test]
    fn test_non_bearer_header_rejected() {
        let req = request("/api/calls", Some("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            extract_token(&req),
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[test]
    fn test_missing_token() {
        let req = request("/api/calls", None);
        assert!(matches!(
            extract_token(&req),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("key-1", "key-1"));
        assert!(!token_matches("key-1", "key-2"));
        assert!(!token_matches("key", "key-1"));
        assert!(!token_matches("", "key-1"));
    }
}
