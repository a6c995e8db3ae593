//! Outbound request seam
//!
//! Both endpoints are plain GETs with query parameters whose body is a JSON
//! document. [`ApiTransport`] hides how that body is obtained so the token and
//! record classification logic can be shared and tested with scripted
//! transports. [`HttpTransport`] is the reqwest implementation.

use crate::error::TransportFailure;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Raw answer of an endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Body text
    pub body: String,
}

impl TransportResponse {
    /// Status in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issue a GET and return the body text
///
/// Implementations return `Ok` for any answer the server produced, including
/// 4xx/5xx, and `Err` only when no answer could be read.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// GET `url` with the given query parameters
    async fn get(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportFailure>;
}

/// reqwest-backed transport with a per-request timeout
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("siaet-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get(
        &self,
        url: &Url,
        query: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportFailure> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(TransportFailure::from)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(TransportFailure::from)?;

        tracing::debug!(url = %url.path(), status, bytes = body.len(), "Response received");

        Ok(TransportResponse { status, body })
    }
}
