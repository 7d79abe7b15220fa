//! HTTP transport behind a trait seam.
//!
//! The engine only ever sees [`Transport`], so tests drive the retry
//! loop with fault-injected fakes and never open a socket. The real
//! implementation carries a per-call timeout, distinct from the retry
//! ceiling: an unresponsive endpoint fails the attempt instead of
//! stalling the whole experiment.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::models::{FewshotError, Result, TransportError};

/// One-shot JSON POST. Returns the raw response body on 2xx.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: &str)
        -> std::result::Result<String, TransportError>;
}

/// Production transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FewshotError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: &str,
    ) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(TransportError::Network)
    }
}
