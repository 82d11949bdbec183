//! Error types for the Cloud API client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when calling the Cloud API.
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request failed (connect, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structured Graph API error response.
    #[error("API error {code} ({kind}): {message}")]
    Api {
        code: i64,
        kind: String,
        message: String,
        /// Whether the provider considers the call worth retrying.
        retryable: bool,
        /// Provider-suggested delay before the next attempt, seconds.
        retry_after: Option<u64>,
    },

    /// Non-success status with a body the Graph error shape didn't fit.
    #[error("unexpected response: HTTP {status}: {body}")]
    Unexpected { status: u16, body: String },
}

impl CloudError {
    /// Whether a retry may succeed.
    ///
    /// Transport failures (timeouts, connection resets) are always worth a
    /// retry; API errors carry the provider's own classification.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Unexpected { status, .. } => *status >= 500,
            Self::Json(_) => false,
        }
    }

    /// Provider-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Whether a Graph API error code is worth retrying.
///
/// Rate limiting (4, 80007, 130429) and transient service conditions
/// (1, 2, 131016, 131021) resolve on their own; everything else (auth,
/// malformed parameters, unsupported recipient) will fail identically on
/// the next attempt.
pub(crate) fn is_retryable_code(code: i64) -> bool {
    matches!(code, 1 | 2 | 4 | 80007 | 130429 | 131016 | 131021)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_codes_are_retryable() {
        assert!(is_retryable_code(4));
        assert!(is_retryable_code(80007));
        assert!(is_retryable_code(130429));
    }

    #[test]
    fn parameter_and_auth_codes_are_not() {
        assert!(!is_retryable_code(100)); // invalid parameter
        assert!(!is_retryable_code(190)); // expired token
        assert!(!is_retryable_code(131026)); // undeliverable recipient
    }

    #[test]
    fn retry_after_only_from_api_errors() {
        let err = CloudError::Api {
            code: 130429,
            kind: "OAuthException".to_string(),
            message: "rate limit".to_string(),
            retryable: true,
            retry_after: Some(30),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));

        let err = CloudError::Unexpected {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), None);

        let err = CloudError::Unexpected {
            status: 404,
            body: "not here".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
