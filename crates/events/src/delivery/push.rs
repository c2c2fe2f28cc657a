//! Push-gateway delivery with exponential-backoff retry.
//!
//! [`PushDelivery`] posts a JSON notification to the mobile push gateway.
//! Failed attempts are retried up to three times with exponential backoff
//! (1 s, 2 s, 4 s). Delivery failure is reported to the caller but is never
//! allowed to influence lifecycle state.

use std::time::Duration;

use plowline_core::types::DbId;

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for push delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("Push gateway returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// PushDelivery
// ---------------------------------------------------------------------------

/// Delivers notifications to the external push gateway.
pub struct PushDelivery {
    client: reqwest::Client,
    gateway_url: String,
}

impl PushDelivery {
    /// Create a delivery service targeting the given gateway URL.
    ///
    /// Returns an error if the HTTP client cannot be constructed (TLS
    /// backend initialization failure).
    pub fn new(gateway_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            gateway_url: gateway_url.into(),
        })
    }

    /// Deliver one notification to the gateway with retry.
    ///
    /// One initial attempt plus up to three retries with exponential
    /// backoff. Returns `Ok(())` on the first successful attempt, or the
    /// error from the final attempt once the retries are exhausted.
    pub async fn deliver(
        &self,
        recipient_user_id: DbId,
        kind: &str,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> Result<(), PushError> {
        let message = serde_json::json!({
            "recipient_user_id": recipient_user_id,
            "kind": kind,
            "title": title,
            "body": body,
            "payload": payload,
        });

        let mut retries = 0;
        loop {
            match self.try_send(&message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let Some(delay_secs) = RETRY_DELAYS_SECS.get(retries) else {
                        tracing::error!(kind, error = %e, "Push delivery failed after all retries");
                        return Err(e);
                    };
                    retries += 1;
                    tracing::warn!(
                        retry = retries,
                        kind,
                        error = %e,
                        "Push delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                }
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, message: &serde_json::Value) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
