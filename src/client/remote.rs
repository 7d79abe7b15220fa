//! Remote execution engine: the retry/dry-run wrapper around adapters.
//!
//! Flow per call: build payload → serialize once → POST with retries →
//! parse. A dry run short-circuits to the adapter's cost estimate and
//! never touches the transport. Only transport-level connectivity
//! failures are retried; a malformed provider response or a
//! non-retryable HTTP status surfaces immediately.
//!
//! The engine is generic over the adapter and the transport and never
//! inspects provider payload shapes.

use std::time::Duration;
use tracing::warn;

use crate::client::adapter::BackendAdapter;
use crate::client::transport::Transport;
use crate::models::{
    CompletionRequest, CompletionResponse, FewshotError, Result, TransportError,
};

/// Retry ceiling and backoff schedule.
///
/// The attempt count contract is 1-indexed and total: `attempts = 5`
/// means at most five transport calls per item. Backoff between
/// attempts is capped exponential; a zero base disables sleeping, which
/// tests rely on to assert exact attempt counts quickly.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }

    /// A policy that retries immediately, without sleeping.
    pub fn without_backoff(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-indexed):
    /// base × 2^(attempt−1), capped at `max_delay`.
    fn delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16));
        exp.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Generic retry/dry-run wrapper shared by all remote adapters.
pub struct RemoteEngine<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> RemoteEngine<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one completion request.
    ///
    /// With `dry_run` the response carries no text and the cost is the
    /// adapter's pre-flight estimate (already rounded up to the cent);
    /// no network call is made. Otherwise the serialized payload is
    /// posted to `<endpoint>/respond`, re-using the same bytes across
    /// retries since the request cannot change mid-loop.
    pub async fn get_completion(
        &self,
        adapter: &dyn BackendAdapter,
        request: &CompletionRequest,
        dry_run: bool,
    ) -> Result<CompletionResponse> {
        if dry_run {
            return Ok(CompletionResponse {
                text: None,
                cost: adapter.estimate_cost(request)?,
            });
        }

        // An engine the adapter cannot price must fail before any I/O.
        adapter.pricing().lookup(&request.engine)?;

        let payload = adapter.build_payload(request)?;
        let body = serde_json::to_string(&payload)
            .map_err(|e| FewshotError::Internal(format!("Failed to serialize payload: {e}")))?;
        let url = format!("{}respond", adapter.endpoint());

        let mut last_error: Option<TransportError> = None;
        for attempt in 1..=self.retry.attempts {
            match self.transport.post(&url, &body).await {
                Ok(raw_body) => {
                    let raw: serde_json::Value = serde_json::from_str(&raw_body).map_err(|e| {
                        FewshotError::InvalidResponse(format!("response is not valid JSON: {e}"))
                    })?;
                    return adapter.parse_response(request, &raw);
                }
                Err(e) if !e.is_retryable() => {
                    return Err(match e {
                        TransportError::Status { status, message } => {
                            FewshotError::Api { status, message }
                        }
                        other => FewshotError::Connectivity {
                            attempts: attempt,
                            source: other,
                        },
                    });
                }
                Err(e) => {
                    warn!(
                        adapter = adapter.name(),
                        attempt = attempt,
                        error = %e,
                        "Connection failed. Retrying..."
                    );
                    last_error = Some(e);
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(self.retry.delay(attempt)).await;
                    }
                }
            }
        }

        Err(FewshotError::Connectivity {
            attempts: self.retry.attempts,
            source: last_error
                .unwrap_or_else(|| TransportError::Timeout(Duration::ZERO)),
        })
    }
}
