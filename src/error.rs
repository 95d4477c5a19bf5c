use thiserror::Error;

/// Type alias for Result with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while reconciling labels, filters and messages
#[derive(Error, Debug)]
pub enum SyncError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// The service answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No user label matches the requested name or id
    #[error("Label '{0}' does not exist. Please create it first")]
    LabelNotFound(String),

    /// Label enumeration failed, so a name could not be resolved
    #[error("Failed to look up labels: {0}")]
    LabelLookup(String),

    #[error("Invalid label name: {0}")]
    InvalidLabelName(String),

    #[error("Invalid sender domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("Invalid filter: {0}")]
    InvalidFilterSpec(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Interactive prompt failed or was cancelled
    #[error("Prompt error: {0}")]
    PromptError(String),
}

impl SyncError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::RateLimitExceeded { .. }
                | SyncError::ServerError { .. }
                | SyncError::NetworkError(_)
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

impl From<inquire::InquireError> for SyncError {
    fn from(error: inquire::InquireError) -> Self {
        SyncError::PromptError(error.to_string())
    }
}

/// Parse the Retry-After header from an HTTP response
///
/// Accepts both delay-seconds ("120") and HTTP-date forms. Missing, invalid or
/// past values fall back to 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    let Some(value) = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
    else {
        return DEFAULT_RETRY_AFTER;
    };

    if let Ok(seconds) = value.parse::<u64>() {
        return seconds;
    }

    httpdate::parse_http_date(value)
        .ok()
        .and_then(|date| date.duration_since(std::time::SystemTime::now()).ok())
        .map(|remaining| remaining.as_secs())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for SyncError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => SyncError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => SyncError::NotFound(message),
                    400 => SyncError::BadRequest(message),
                    403 => SyncError::Forbidden(message),
                    500..=599 => SyncError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => SyncError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => SyncError::BadRequest(err.to_string()),
            google_gmail1::Error::HttpError(ref err) => {
                SyncError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => SyncError::NetworkError(err.to_string()),
            _ => SyncError::ApiError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let rate_limit = SyncError::RateLimitExceeded { retry_after: 5 };
        assert!(rate_limit.is_transient());
        assert!(!rate_limit.is_permanent());

        let server_error = SyncError::ServerError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(server_error.is_transient());

        assert!(SyncError::NetworkError("timeout".to_string()).is_transient());
    }

    #[test]
    fn test_lookup_and_validation_errors_are_permanent() {
        assert!(SyncError::LabelNotFound("Shopping".to_string()).is_permanent());
        assert!(SyncError::LabelLookup("HTTP 500".to_string()).is_permanent());
        assert!(SyncError::InvalidFilterSpec("empty label".to_string()).is_permanent());
        assert!(SyncError::NotFound("filter-1".to_string()).is_permanent());
    }

    #[test]
    fn test_error_display_names_the_cause() {
        let error = SyncError::LabelNotFound("Shopping".to_string());
        assert_eq!(
            error.to_string(),
            "Label 'Shopping' does not exist. Please create it first"
        );

        let error = SyncError::InvalidDomain {
            domain: "bad domain".to_string(),
            reason: "contains whitespace".to_string(),
        };
        assert!(error.to_string().contains("bad domain"));
        assert!(error.to_string().contains("contains whitespace"));
    }

    #[test]
    fn test_parse_retry_after_header_integer() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("120"),
        );

        assert_eq!(parse_retry_after_header(&response), 120);
    }

    #[test]
    fn test_parse_retry_after_header_missing_or_invalid() {
        let response = hyper::Response::builder().status(429).body(()).unwrap();
        assert_eq!(parse_retry_after_header(&response), 5);

        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("soon"),
        );
        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        let future_time = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&httpdate::fmt_http_date(future_time)).unwrap(),
        );

        let retry_after = parse_retry_after_header(&response);
        assert!((58..=61).contains(&retry_after), "got {}", retry_after);
    }

    #[test]
    fn test_parse_retry_after_header_past_http_date() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        let past_time = std::time::SystemTime::now() - std::time::Duration::from_secs(60);
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_str(&httpdate::fmt_http_date(past_time)).unwrap(),
        );

        assert_eq!(parse_retry_after_header(&response), 5);
    }
}
