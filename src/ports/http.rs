//! HTTP client port used by endpoint checks.

use std::time::Duration;

use super::{describe_timeout, PortFuture};

/// A response received from an HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response body, lossily decoded.
    pub body: String,
}

/// Failure to obtain any response at all.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// No response arrived before the deadline.
    #[error("timed out after {}", describe_timeout(*.0))]
    Timeout(Duration),
    /// The request could not be sent (DNS, connection refused, bad URL, ...).
    #[error("request failed: {0}")]
    Request(String),
}

/// Issues HTTP requests with a bounded timeout.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Timeout`] when no response arrives in time and
    /// [`HttpError::Request`] for every other transport failure.
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<HttpResponse, HttpError>>;
}
