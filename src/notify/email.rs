use reqwest::Client;
use serde_json::json;

use crate::notify::{DispatchStatus, NotifyError};

/// Client for the transactional mail relay. When no API key is
/// configured the client runs disabled and logs the message instead,
/// which keeps local development working without a mail account.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl EmailClient {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<DispatchStatus, NotifyError> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(to, subject, "email disabled, message not sent");
            return Ok(DispatchStatus::Skipped);
        };

        let body = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "html": html,
            "text": text,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "email",
                status,
                message,
            });
        }

        Ok(DispatchStatus::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_posts_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/emails")
            .match_header("authorization", "Bearer mail-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "from": "no-reply@datawaves.app",
                "to": "ama@example.com",
                "subject": "Your bundle is on the way",
            })))
            .with_status(200)
            .with_body(r#"{"id": "msg_1"}"#)
            .create_async()
            .await;

        let client = EmailClient::new(
            format!("{}/emails", server.url()),
            Some("mail-key".to_string()),
            "no-reply@datawaves.app".to_string(),
        );
        let status = client
            .send(
                "ama@example.com",
                "Your bundle is on the way",
                "<p>hi</p>",
                "hi",
            )
            .await
            .unwrap();

        assert_eq!(status, DispatchStatus::Sent);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disabled_client_skips_without_error() {
        let client = EmailClient::new(
            "https://api.resend.com/emails".to_string(),
            None,
            "no-reply@datawaves.app".to_string(),
        );
        let status = client
            .send("ama@example.com", "subject", "<p>hi</p>", "hi")
            .await
            .unwrap();

        assert!(!client.is_enabled());
        assert_eq!(status, DispatchStatus::Skipped);
    }

    #[tokio::test]
    async fn test_relay_rejection_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/emails")
            .with_status(422)
            .with_body("bad recipient")
            .create_async()
            .await;

        let client = EmailClient::new(
            format!("{}/emails", server.url()),
            Some("mail-key".to_string()),
            "no-reply@datawaves.app".to_string(),
        );
        let err = client
            .send("not-an-address", "subject", "<p>hi</p>", "hi")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NotifyError::Rejected {
                channel: "email",
                status: 422,
                ..
            }
        ));
    }
}
