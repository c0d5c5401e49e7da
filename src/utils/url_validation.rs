//! URL validation for platform-supplied endpoints
//!
//! Realtime monitor endpoints come from call results and poll responses, so
//! they are checked before a socket is opened. Base URLs come from
//! configuration and are checked at load time.

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("Unsupported URL scheme '{found}', expected {expected}")]
    UnsupportedScheme {
        found: String,
        expected: &'static str,
    },

    #[error("URL must have a host")]
    MissingHost,
}

/// Validates a realtime endpoint URL.
///
/// Accepts `ws` and `wss` URLs with a host and returns the parsed URL.
///
/// # Example
/// ```rust,ignore
/// use waav_dialer::utils::url_validation::validate_realtime_url;
///
/// assert!(validate_realtime_url("wss://phone-call-websocket.example.com/1/listen").is_ok());
/// assert!(validate_realtime_url("https://example.com/listen").is_err());
/// ```
pub fn validate_realtime_url(url: &str) -> Result<Url, UrlValidationError> {
    validate_with_schemes(url, &["ws", "wss"], "ws or wss")
}

/// Validates an HTTP(S) base URL such as the platform REST root.
pub fn validate_http_url(url: &str) -> Result<Url, UrlValidationError> {
    validate_with_schemes(url, &["http", "https"], "http or https")
}

fn validate_with_schemes(
    url: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url.trim())?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(UrlValidationError::UnsupportedScheme {
            found: parsed.scheme().to_string(),
            expected,
        });
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(UrlValidationError::MissingHost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_url_accepts_ws_schemes() {
        assert!(validate_realtime_url("wss://monitor.example.com/call/1/listen").is_ok());
        assert!(validate_realtime_url("ws://127.0.0.1:9000/listen").is_ok());
        assert!(validate_realtime_url("  wss://monitor.example.com/x  ").is_ok());
    }

    #[test]
    fn test_realtime_url_rejects_http() {
        let err = validate_realtime_url("https://monitor.example.com/listen").unwrap_err();
        assert_eq!(
            err,
            UrlValidationError::UnsupportedScheme {
                found: "https".to_string(),
                expected: "ws or wss",
            }
        );
    }

    #[test]
    fn test_realtime_url_rejects_garbage() {
        assert!(matches!(
            validate_realtime_url("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
        assert!(validate_realtime_url("").is_err());
    }

    #[test]
    fn test_http_url() {
        assert!(validate_http_url("https://api.vapi.ai").is_ok());
        assert!(validate_http_url("http://localhost:8080").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert_eq!(
            validate_http_url("file:///tmp/x").unwrap_err(),
            UrlValidationError::UnsupportedScheme {
                found: "file".to_string(),
                expected: "http or https",
            }
        );
    }
}
