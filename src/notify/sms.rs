use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::notify::{DispatchStatus, NotifyError};

/// Client for the SMS HTTP gateway. Like the mail client it degrades
/// to a logging no-op when no API key is configured.
#[derive(Clone)]
pub struct SmsClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SmsReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
}

impl SmsClient {
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn send(&self, phone: &str, message: &str) -> Result<DispatchStatus, NotifyError> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(phone, "sms disabled, message not sent");
            return Ok(DispatchStatus::Skipped);
        };

        let body = json!({
            "key": api_key,
            "phone": phone,
            "message": message,
        });

        let response = self.client.post(&self.api_url).json(&body).send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "sms",
                status,
                message,
            });
        }

        let reply: SmsReply = response.json().await?;
        if !reply.success {
            return Err(NotifyError::Rejected {
                channel: "sms",
                status,
                message: reply.message,
            });
        }

        Ok(DispatchStatus::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_posts_key_phone_and_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/send")
            .match_body(mockito::Matcher::Json(json!({
                "key": "sms-key",
                "phone": "+233241234567",
                "message": "Your 5GB MTN bundle is confirmed.",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "message": "queued"}"#)
            .create_async()
            .await;

        let client = SmsClient::new(
            format!("{}/v1/send", server.url()),
            Some("sms-key".to_string()),
        );
        let status = client
            .send("+233241234567", "Your 5GB MTN bundle is confirmed.")
            .await
            .unwrap();

        assert_eq!(status, DispatchStatus::Sent);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disabled_client_skips() {
        let client = SmsClient::new("https://sms.example.com/send".to_string(), None);
        let status = client.send("+233241234567", "hello").await.unwrap();
        assert_eq!(status, DispatchStatus::Skipped);
    }

    #[tokio::test]
    async fn test_gateway_level_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/send")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": false, "message": "insufficient credits"}"#)
            .create_async()
            .await;

        let client = SmsClient::new(
            format!("{}/v1/send", server.url()),
            Some("sms-key".to_string()),
        );
        let err = client.send("+233241234567", "hello").await.unwrap_err();

        match err {
            NotifyError::Rejected {
                channel, message, ..
            } => {
                assert_eq!(channel, "sms");
                assert_eq!(message, "insufficient credits");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_level_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/send")
            .with_status(500)
            .with_body("gateway exploded")
            .create_async()
            .await;

        let client = SmsClient::new(
            format!("{}/v1/send", server.url()),
            Some("sms-key".to_string()),
        );
        let err = client.send("+233241234567", "hello").await.unwrap_err();

        assert!(matches!(
            err,
            NotifyError::Rejected {
                channel: "sms",
                status: 500,
                ..
            }
        ));
    }
}
