//! Optional pre-purchase number screening against an external
//! registry (inactive SIM / blocklist lookups).
//!
//! Screening is advisory: the configured [`ScreenPolicy`] decides
//! whether an unreachable registry blocks the purchase or lets it
//! proceed.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenVerdict {
    Clear,
    Blocked,
}

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("screening request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("screening service replied {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// How to treat a purchase when the screening service cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenPolicy {
    /// Let the purchase proceed and log the failure.
    #[default]
    FailOpen,
    /// Reject the purchase until the service recovers.
    FailClosed,
}

impl FromStr for ScreenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_open" | "fail-open" | "open" => Ok(ScreenPolicy::FailOpen),
            "fail_closed" | "fail-closed" | "closed" => Ok(ScreenPolicy::FailClosed),
            other => Err(format!("unknown screening policy: {other}")),
        }
    }
}

#[async_trait]
pub trait NumberScreen: Send + Sync {
    async fn screen(&self, phone_e164: &str) -> Result<ScreenVerdict, ScreenError>;
}

/// Screening client for an HTTP registry. The registry answers
/// `{"active": bool, "blacklisted": bool}` for a posted number.
#[derive(Clone)]
pub struct HttpNumberScreen {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpNumberScreen {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScreenResponse {
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    blacklisted: bool,
}

fn default_active() -> bool {
    true
}

#[async_trait]
impl NumberScreen for HttpNumberScreen {
    async fn screen(&self, phone_e164: &str) -> Result<ScreenVerdict, ScreenError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "phone": phone_e164 }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ScreenError::Rejected { status, message });
        }

        let body: ScreenResponse = response.json().await?;
        if body.active && !body.blacklisted {
            Ok(ScreenVerdict::Clear)
        } else {
            Ok(ScreenVerdict::Blocked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parses_both_spellings() {
        assert_eq!(
            "fail_open".parse::<ScreenPolicy>().unwrap(),
            ScreenPolicy::FailOpen
        );
        assert_eq!(
            "fail-closed".parse::<ScreenPolicy>().unwrap(),
            ScreenPolicy::FailClosed
        );
        assert!("maybe".parse::<ScreenPolicy>().is_err());
    }

    #[test]
    fn test_policy_defaults_to_fail_open() {
        assert_eq!(ScreenPolicy::default(), ScreenPolicy::FailOpen);
    }

    #[tokio::test]
    async fn test_clear_number() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/screen")
            .match_body(mockito::Matcher::Json(json!({"phone": "+233241234567"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "blacklisted": false}"#)
            .create_async()
            .await;

        let screen = HttpNumberScreen::new(format!("{}/screen", server.url()), None);
        let verdict = screen.screen("+233241234567").await.unwrap();

        assert_eq!(verdict, ScreenVerdict::Clear);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_blacklisted_number_is_blocked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/screen")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "blacklisted": true}"#)
            .create_async()
            .await;

        let screen = HttpNumberScreen::new(format!("{}/screen", server.url()), None);
        let verdict = screen.screen("+233241234567").await.unwrap();

        assert_eq!(verdict, ScreenVerdict::Blocked);
    }

    #[tokio::test]
    async fn test_inactive_number_is_blocked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/screen")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": false}"#)
            .create_async()
            .await;

        let screen = HttpNumberScreen::new(format!("{}/screen", server.url()), None);
        let verdict = screen.screen("+233241234567").await.unwrap();

        assert_eq!(verdict, ScreenVerdict::Blocked);
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_screen_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/screen")
            .with_status(503)
            .with_body("registry down")
            .create_async()
            .await;

        let screen = HttpNumberScreen::new(format!("{}/screen", server.url()), None);
        let err = screen.screen("+233241234567").await.unwrap_err();

        assert!(matches!(err, ScreenError::Rejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_api_key_is_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/screen")
            .match_header("authorization", "Bearer screen-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"active": true, "blacklisted": false}"#)
            .create_async()
            .await;

        let screen = HttpNumberScreen::new(
            format!("{}/screen", server.url()),
            Some("screen-key".to_string()),
        );
        screen.screen("+233241234567").await.unwrap();

        mock.assert_async().await;
    }
}
