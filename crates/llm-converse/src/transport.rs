//! HTTP transport seam.
//!
//! Adapters only build requests and parse responses; sending goes through
//! an [`HttpTransport`]. [`ReqwestTransport`] is the real implementation;
//! tests swap in [`MockTransport`](crate::mock::MockTransport).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use http::HeaderValue;

use crate::error::LlmError;
use crate::provider::HttpRequest;

/// Sends one built request and returns the raw response.
///
/// Implementations return every response as-is, including non-2xx ones;
/// status handling happens in [`check_status`].
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Posts `request` and resolves once response headers arrive.
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<reqwest::Response, LlmError>> + Send + '_>>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses a pre-configured client for connection pooling.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<reqwest::Response, LlmError>> + Send + '_>> {
        Box::pin(async move {
            let HttpRequest { url, mut headers, body } = request;
            headers
                .entry(http::header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static("application/json"));

            tracing::debug!(%url, "sending request");
            self.client
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_error)
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        // Client-level timeout; the configured duration is not known here.
        LlmError::Timeout { elapsed_ms: 0 }
    } else {
        LlmError::Http {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

/// Passes 2xx responses through and turns anything else into
/// [`LlmError::Http`] carrying the status and raw body text.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%status, "provider returned error status");
    Err(LlmError::Http {
        status: Some(status),
        message: body,
    })
}

/// Runs `fut` under an optional deadline.
///
/// When the deadline passes the future is dropped, which cancels the
/// in-flight request, and [`LlmError::Timeout`] is returned.
pub async fn with_timeout<F, T>(limit: Option<Duration>, fut: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            LlmError::Timeout {
                elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }
        })?,
        None => fut.await,
    }
}
