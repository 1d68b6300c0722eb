//! Reloadly airtime/data aggregator client.
//!
//! OAuth client-credentials tokens are cached and refreshed five
//! minutes before expiry. Top-up calls run behind a circuit breaker so
//! a dead aggregator fails fast instead of queueing paid transactions
//! against a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::header;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::Network;

const TOPUPS_ACCEPT: &str = "application/com.reloadly.topups-v1+json";
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ReloadlyError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("authentication with aggregator failed: {0}")]
    AuthFailed(String),

    #[error("top-up rejected: {0}")]
    TopupFailed(String),

    #[error("balance check failed: {0}")]
    BalanceFailed(String),

    #[error("aggregator circuit breaker is open")]
    CircuitBreakerOpen,
}

/// Aggregator-side identifier of a mobile operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorId(pub i64);

/// Mapping from supported networks to aggregator operator ids. A
/// `None` entry means the operator is not provisioned on the
/// aggregator account and purchases for it cannot be fulfilled.
#[derive(Debug, Clone)]
pub struct OperatorMap {
    pub mtn: Option<i64>,
    pub telecel: Option<i64>,
    pub airteltigo: Option<i64>,
}

impl Default for OperatorMap {
    fn default() -> Self {
        OperatorMap {
            mtn: Some(1),
            telecel: Some(2),
            airteltigo: Some(3),
        }
    }
}

impl OperatorMap {
    pub fn resolve(&self, network: Network) -> Option<OperatorId> {
        let id = match network {
            Network::Mtn => self.mtn,
            Network::Telecel => self.telecel,
            Network::AirtelTigo => self.airteltigo,
        };
        id.map(OperatorId)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub balance: f64,
    #[serde(rename = "currencyCode", default)]
    pub currency_code: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// HTTP client for the Reloadly top-up API.
#[derive(Clone)]
pub struct ReloadlyClient {
    client: Client,
    auth_url: String,
    base_url: String,
    client_id: String,
    client_secret: String,
    operators: OperatorMap,
    token: Arc<Mutex<Option<CachedToken>>>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl ReloadlyClient {
    pub fn new(
        auth_url: String,
        base_url: String,
        client_id: String,
        client_secret: String,
        operators: OperatorMap,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        ReloadlyClient {
            client,
            auth_url,
            base_url,
            client_id,
            client_secret,
            operators,
            token: Arc::new(Mutex::new(None)),
            circuit_breaker,
        }
    }

    pub fn operators(&self) -> &OperatorMap {
        &self.operators
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Returns a valid access token, fetching a fresh one when the
    /// cached token is within the refresh margin. The cache lock is
    /// held across the refresh so concurrent callers do not stampede
    /// the auth endpoint.
    async fn access_token(&self) -> Result<String, ReloadlyError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenReply {
            access_token: String,
            #[serde(default)]
            expires_in: Option<u64>,
        }

        let body = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret,
            "grant_type": "client_credentials",
            "audience": self.base_url,
        });

        let response = self.client.post(&self.auth_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ReloadlyError::AuthFailed(reply_message(response).await));
        }

        let reply: TokenReply = response.json().await?;
        let lifetime = reply.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at =
            Instant::now() + Duration::from_secs(lifetime.saturating_sub(TOKEN_REFRESH_MARGIN_SECS));
        *slot = Some(CachedToken {
            token: reply.access_token.clone(),
            expires_at,
        });

        Ok(reply.access_token)
    }

    /// Delivers a data bundle and returns the aggregator's raw reply,
    /// which the caller persists verbatim for audit.
    pub async fn topup(
        &self,
        phone_e164: &str,
        operator: OperatorId,
        amount: &BigDecimal,
    ) -> Result<Value, ReloadlyError> {
        let token = self.access_token().await?;
        let url = format!("{}/topups", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();

        let body = serde_json::json!({
            "recipientPhone": {
                "countryCode": "GH",
                "number": phone_e164,
            },
            "operatorId": operator.0,
            "amount": amount.to_f64().unwrap_or(0.0),
            "useLocalAmount": false,
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(&token)
                    .header(header::ACCEPT, TOPUPS_ACCEPT)
                    .json(&body)
                    .send()
                    .await
                    .map_err(ReloadlyError::from)?;

                if !response.status().is_success() {
                    return Err(ReloadlyError::TopupFailed(reply_message(response).await));
                }

                response.json::<Value>().await.map_err(ReloadlyError::from)
            })
            .await;

        match result {
            Ok(reply) => Ok(reply),
            Err(FailsafeError::Rejected) => Err(ReloadlyError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    pub async fn check_balance(&self) -> Result<AccountBalance, ReloadlyError> {
        let token = self.access_token().await?;
        let url = format!("{}/accounts/balance", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .header(header::ACCEPT, TOPUPS_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReloadlyError::BalanceFailed(reply_message(response).await));
        }

        let balance: AccountBalance = response.json().await?;
        Ok(balance)
    }
}

/// Pulls `message` out of an error reply, falling back to the status
/// line when the body is not the expected JSON.
async fn reply_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => body["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {status}")),
        Err(_) => format!("status {status}"),
    }
}
