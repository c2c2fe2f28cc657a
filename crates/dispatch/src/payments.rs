//! Payment provider client.
//!
//! [`PaymentClient`] is the seam between the expiration flow and the
//! external payment provider. The engine only ever asks it to refund a
//! charge; everything else about payments lives outside this system.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// HTTP request timeout for a single refund call. A hung provider must
/// never stall the sweep.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for refund failures. All variants are retryable from the
/// engine's point of view; the retry ceiling lives in the sweeper.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("payment request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider rejected the refund.
    #[error("payment provider returned HTTP {0}")]
    Declined(u16),
}

/// A settled refund, as acknowledged by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    /// Provider-side reference for the refund transaction.
    pub refund_id: String,
}

/// Issues refunds against the payment provider.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Refund `amount_cents` of the given charge.
    async fn refund(
        &self,
        charge_reference: &str,
        amount_cents: i64,
    ) -> Result<RefundReceipt, PaymentError>;
}

/// HTTP implementation posting to `{base_url}/refunds`.
pub struct HttpPaymentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentClient {
    /// Create a client targeting the given provider base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    async fn refund(
        &self,
        charge_reference: &str,
        amount_cents: i64,
    ) -> Result<RefundReceipt, PaymentError> {
        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .json(&serde_json::json!({
                "charge_reference": charge_reference,
                "amount_cents": amount_cents,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PaymentError::Declined(response.status().as_u16()));
        }
        Ok(response.json::<RefundReceipt>().await?)
    }
}
