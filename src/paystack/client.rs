//! Paystack payment gateway client.
//!
//! Charges are initialized in minor units (pesewas). Webhook bodies
//! are authenticated with an HMAC-SHA512 signature over the raw bytes,
//! keyed by the gateway secret.

use bigdecimal::{BigDecimal, ToPrimitive};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

#[derive(Error, Debug)]
pub enum PaystackError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("payment initialization rejected: {0}")]
    InitializationFailed(String),

    #[error("payment verification rejected: {0}")]
    VerificationFailed(String),

    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("amount {0} cannot be charged in pesewas")]
    InvalidAmount(String),
}

/// Gateway reply envelope: `status` is the request-level flag,
/// payload lives under `data`.
#[derive(Debug, Deserialize)]
struct GatewayEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of a server-side charge verification.
#[derive(Debug, Clone)]
pub struct ChargeVerification {
    pub succeeded: bool,
    /// Gateway's own status word (`success`, `failed`, `abandoned`).
    pub gateway_status: String,
    pub amount_minor: i64,
}

/// HTTP client for the Paystack REST API.
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    base_url: String,
    secret_key: String,
    callback_url: String,
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String, callback_url: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        PaystackClient {
            client,
            base_url,
            secret_key,
            callback_url,
        }
    }

    /// Creates a charge and returns the hosted checkout handle.
    pub async fn initialize(
        &self,
        email: &str,
        amount: &BigDecimal,
        metadata: Value,
    ) -> Result<InitializedPayment, PaystackError> {
        let amount_minor = to_minor_units(amount)
            .ok_or_else(|| PaystackError::InvalidAmount(amount.to_string()))?;
        let url = format!(
            "{}/transaction/initialize",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "email": email,
            "amount": amount_minor,
            "callback_url": self.callback_url,
            "metadata": metadata,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;
        let envelope: GatewayEnvelope = response.json().await?;

        if !envelope.status {
            return Err(PaystackError::InitializationFailed(envelope.message));
        }

        let payment: InitializedPayment = serde_json::from_value(envelope.data)
            .map_err(|e| PaystackError::InvalidResponse(e.to_string()))?;
        if payment.reference.is_empty() {
            return Err(PaystackError::InvalidResponse(
                "initialization reply carried no reference".to_string(),
            ));
        }
        Ok(payment)
    }

    /// Verifies a charge server-side. Used on the browser-redirect
    /// path, where the query string alone proves nothing.
    pub async fn verify(&self, reference: &str) -> Result<ChargeVerification, PaystackError> {
        let url = format!(
            "{}/transaction/verify/{}",
            self.base_url.trim_end_matches('/'),
            reference
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let envelope: GatewayEnvelope = response.json().await?;

        if !envelope.status {
            return Err(PaystackError::VerificationFailed(envelope.message));
        }

        let gateway_status = envelope.data["status"].as_str().unwrap_or("").to_string();
        let amount_minor = envelope.data["amount"].as_i64().unwrap_or(0);

        Ok(ChargeVerification {
            succeeded: gateway_status == "success",
            gateway_status,
            amount_minor,
        })
    }

    /// Constant-time check of the `x-paystack-signature` header value
    /// against the raw request body.
    pub fn validate_signature(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha512::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

/// Major-unit price to pesewas. `21.00` becomes `2100`.
fn to_minor_units(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100)).round(0).to_i64()
}
