//! # External Service Error Types
//!
//! Error types shared by the product catalog and geocoder clients.

/// Errors returned by external HTTP services
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The call did not complete within the configured timeout
    Timeout(String),
    /// The service answered with a non-success status code
    Http(u16),
    /// Connection or request level failure
    Transport(String),
    /// The response body could not be decoded
    Decode(String),
    /// The circuit breaker is open and the call was not attempted
    CircuitOpen(String),
    /// The service answered but found nothing for the query
    NotFound(String),
}

impl ServiceError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout(_) | ServiceError::Transport(_) => true,
            ServiceError::Http(status) => *status >= 500 || *status == 429,
            ServiceError::Decode(_) | ServiceError::CircuitOpen(_) | ServiceError::NotFound(_) => false,
        }
    }

    /// Whether the error says something about the health of the service
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, ServiceError::NotFound(_) | ServiceError::CircuitOpen(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            ServiceError::Http(status) => write!(f, "HTTP error: status {status}"),
            ServiceError::Transport(msg) => write!(f, "Transport error: {msg}"),
            ServiceError::Decode(msg) => write!(f, "Decode error: {msg}"),
            ServiceError::CircuitOpen(service) => write!(f, "Circuit open for service: {service}"),
            ServiceError::NotFound(query) => write!(f, "Nothing found for: {query}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            ServiceError::Http(status.as_u16())
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}
