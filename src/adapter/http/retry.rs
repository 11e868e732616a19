//! HTTP Retry Policy and Error Classification
//!
//! リトライポリシーとエラー分類

use backon::ExponentialBuilder;
use std::time::Duration;

use crate::error::Error;

pub const MAX_RETRIES: usize = 3;
pub const INITIAL_RETRY_DELAY_MS: u64 = 1000;
pub const MAX_RETRY_DELAY_MS: u64 = 8000;

/// Exponential backoff used for every API request
pub fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(INITIAL_RETRY_DELAY_MS))
        .with_max_delay(Duration::from_millis(MAX_RETRY_DELAY_MS))
        .with_max_times(MAX_RETRIES)
        .with_jitter()
}

/// Check if an error requires a new connection
pub fn is_connection_error(error_msg: &str) -> bool {
    let lower = error_msg.to_lowercase();
    lower.contains("broken pipe")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("connection closed")
        || lower.contains("error sending request")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("unexpected end of file")
}

/// Rate limiting and server errors are worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

/// OAuth2 error codes a token endpoint uses for temporary failures
pub fn is_transient_oauth2_error(code: &str) -> bool {
    matches!(code, "temporarily_unavailable" | "server_error")
}

/// Check if an API or token endpoint error is transient
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Api {
            status: Some(status),
            ..
        } => is_retryable_status(*status),
        Error::Api { status: None, message } => is_connection_error(message),
        Error::OAuth2Server { status, error, .. } => {
            status.is_some_and(is_retryable_status) || is_transient_oauth2_error(error)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: Option<u16>, message: &str) -> Error {
        Error::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_is_connection_error() {
        assert!(is_connection_error("Broken pipe"));
        assert!(is_connection_error("connection reset by peer"));
        assert!(is_connection_error("Connection refused"));
        assert!(is_connection_error("error sending request for url"));
        assert!(is_connection_error("operation timed out"));

        assert!(!is_connection_error("invalid_grant"));
        assert!(!is_connection_error("Not Found"));
    }

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));

        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
    }

    fn token_endpoint(status: Option<u16>, error: &str) -> Error {
        Error::OAuth2Server {
            status,
            error: error.to_string(),
            message: error.to_string(),
        }
    }

    #[test]
    fn test_is_retryable_token_endpoint() {
        assert!(is_retryable(&token_endpoint(Some(503), "")));
        assert!(is_retryable(&token_endpoint(Some(429), "rate_limit_exceeded")));
        assert!(is_retryable(&token_endpoint(None, "temporarily_unavailable")));
        assert!(is_retryable(&token_endpoint(None, "server_error")));

        assert!(!is_retryable(&token_endpoint(None, "invalid_grant")));
        assert!(!is_retryable(&token_endpoint(Some(400), "invalid_client")));
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&api(Some(503), "backendError")));
        assert!(is_retryable(&api(None, "error sending request: Connection refused")));

        assert!(!is_retryable(&api(Some(404), "Requested entity was not found.")));
        assert!(!is_retryable(&api(None, "builder error")));
        assert!(!is_retryable(&Error::OAuth2("invalid_grant".to_string())));
        assert!(!is_retryable(&Error::message_of("timeout")));
    }
}
