//! Live adapter for the `HttpClient` port using `reqwest`.

use std::time::Duration;

use reqwest::Client;

use crate::ports::http::{HttpClient, HttpError, HttpResponse};
use crate::ports::PortFuture;

/// Live HTTP client sharing one connection pool across checks.
pub struct LiveHttpClient {
    client: Client,
}

impl LiveHttpClient {
    /// Creates a new live HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for LiveHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for LiveHttpClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<HttpResponse, HttpError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| classify(&e, timeout))?;
            let status = response.status().as_u16();
            // The status is the verdict; a body that fails to stream is not.
            let body = response.text().await.unwrap_or_default();
            Ok(HttpResponse { status, body })
        })
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(timeout)
    } else {
        HttpError::Request(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_url_is_a_request_error() {
        let client = LiveHttpClient::new();
        let err = client.get("not a url", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, HttpError::Request(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_request_error() {
        let client = LiveHttpClient::new();
        let err = client
            .get("http://127.0.0.1:1/health", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Request(_)));
    }
}
