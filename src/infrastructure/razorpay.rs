use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;

use crate::config::RazorpayConfig;
use crate::domain::errors::DomainError;
use crate::domain::order::{PaymentIntent, PaymentIntentRequest};
use crate::domain::ports::PaymentGateway;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 of `order_id|payment_id`, as Razorpay signs
/// checkout callbacks.
pub fn expected_signature(
    key_secret: &str,
    provider_order_id: &str,
    payment_id: &str,
) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes()).ok()?;
    mac.update(provider_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(
    key_secret: &str,
    provider_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    expected_signature(key_secret, provider_order_id, payment_id)
        .is_some_and(|expected| constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: Notes,
}

#[derive(Debug, Serialize)]
struct Notes {
    order_id_from_db: String,
}

/// Razorpay Orders API client. A Razorpay "order" is the payment intent the
/// checkout widget pays against.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, DomainError> {
        let url = format!("{}/orders", self.config.api_base.trim_end_matches('/'));
        let body = CreateOrderBody {
            amount: request.amount,
            currency: &request.currency,
            receipt: &request.receipt,
            notes: Notes {
                order_id_from_db: request.order_id.to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Payment(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DomainError::Payment(format!(
                "create order returned {status}: {error_text}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DomainError::Payment(format!("invalid response: {e}")))?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomainError::Payment("response has no order id".to_string()))?
            .to_string();

        Ok(PaymentIntent { id, body })
    }

    fn verify_signature(&self, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(&self.config.key_secret, provider_order_id, payment_id, signature)
    }
}
