//! Customer and admin notifications.
//!
//! Purchase outcomes always fan out to both channels; the stored
//! per-transaction preference only narrows receipt resends. Dispatch
//! failures are reported back as records, never as errors, so a dead
//! mail relay cannot disturb transaction processing.

pub mod email;
pub mod sms;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use email::EmailClient;
pub use sms::SmsClient;

use crate::db::models::{DataPlan, Transaction, User};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{channel} gateway rejected message ({status}): {message}")]
    Rejected {
        channel: &'static str,
        status: u16,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Sent,
    /// Channel is disabled by configuration; nothing was transmitted.
    Skipped,
}

/// Outcome of one delivery attempt on one channel.
#[derive(Debug)]
pub struct DispatchRecord {
    pub channel: Channel,
    pub outcome: Result<DispatchStatus, NotifyError>,
}

impl DispatchRecord {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, Ok(DispatchStatus::Sent))
    }
}

pub struct Notifier {
    email: EmailClient,
    sms: SmsClient,
    admin_email: Option<String>,
    admin_phone: Option<String>,
}

impl Notifier {
    pub fn new(
        email: EmailClient,
        sms: SmsClient,
        admin_email: Option<String>,
        admin_phone: Option<String>,
    ) -> Self {
        Self {
            email,
            sms,
            admin_email,
            admin_phone,
        }
    }

    /// Confirms a delivered bundle on both channels.
    pub async fn send_purchase_confirmation(
        &self,
        tx: &Transaction,
        user: &User,
        plan: &DataPlan,
    ) -> Vec<DispatchRecord> {
        let sms_to = sms_recipient(tx);
        let subject = "Your data bundle is on its way";
        let text = confirmation_text(tx, plan);
        let html = confirmation_html(tx, user, plan);

        let (sms_outcome, email_outcome) = tokio::join!(
            self.sms.send(&sms_to, &text),
            self.email.send(&user.email, subject, &html, &text),
        );

        let records = vec![
            DispatchRecord {
                channel: Channel::Sms,
                outcome: sms_outcome,
            },
            DispatchRecord {
                channel: Channel::Email,
                outcome: email_outcome,
            },
        ];
        log_outcomes("purchase confirmation", &tx.payment_reference, &records);
        records
    }

    /// Tells the customer a purchase failed, on both channels.
    pub async fn send_failure_notice(
        &self,
        tx: &Transaction,
        user: &User,
        reason: &str,
    ) -> Vec<DispatchRecord> {
        let sms_to = sms_recipient(tx);
        let subject = "Your data bundle purchase failed";
        let text = failure_text(tx, reason);
        let html = failure_html(tx, user, reason);

        let (sms_outcome, email_outcome) = tokio::join!(
            self.sms.send(&sms_to, &text),
            self.email.send(&user.email, subject, &html, &text),
        );

        let records = vec![
            DispatchRecord {
                channel: Channel::Sms,
                outcome: sms_outcome,
            },
            DispatchRecord {
                channel: Channel::Email,
                outcome: email_outcome,
            },
        ];
        log_outcomes("failure notice", &tx.payment_reference, &records);
        records
    }

    /// Resends the receipt over the channels the customer originally
    /// asked for.
    pub async fn resend_receipt(
        &self,
        tx: &Transaction,
        user: &User,
        plan: &DataPlan,
    ) -> Vec<DispatchRecord> {
        let method = tx.confirmation();
        let mut records = Vec::new();

        if method.includes_sms() {
            let outcome = self.sms.send(&sms_recipient(tx), &confirmation_text(tx, plan)).await;
            records.push(DispatchRecord {
                channel: Channel::Sms,
                outcome,
            });
        }
        if method.includes_email() {
            let outcome = self
                .email
                .send(
                    &user.email,
                    "Your data bundle receipt",
                    &confirmation_html(tx, user, plan),
                    &confirmation_text(tx, plan),
                )
                .await;
            records.push(DispatchRecord {
                channel: Channel::Email,
                outcome,
            });
        }

        log_outcomes("receipt resend", &tx.payment_reference, &records);
        records
    }

    /// Best-effort operator alert. Missing admin contacts just skip.
    pub async fn send_admin_alert(&self, subject: &str, details: &Value) -> Vec<DispatchRecord> {
        let mut records = Vec::new();

        if let Some(admin_email) = &self.admin_email {
            let text = admin_alert_text(subject, details);
            let html = format!(
                "<h3>{subject}</h3><pre>{}</pre>",
                serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string())
            );
            let outcome = self
                .email
                .send(admin_email, &format!("[DataWaves alert] {subject}"), &html, &text)
                .await;
            records.push(DispatchRecord {
                channel: Channel::Email,
                outcome,
            });
        }

        if let Some(admin_phone) = &self.admin_phone {
            let outcome = self
                .sms
                .send(admin_phone, &admin_alert_text(subject, details))
                .await;
            records.push(DispatchRecord {
                channel: Channel::Sms,
                outcome,
            });
        }

        if records.is_empty() {
            tracing::warn!(subject, "no admin contacts configured, alert dropped");
        } else {
            log_outcomes("admin alert", subject, &records);
        }
        records
    }

    pub fn channel_summary(&self) -> (bool, bool) {
        (self.email.is_enabled(), self.sms.is_enabled())
    }
}

fn sms_recipient(tx: &Transaction) -> String {
    tx.confirmation_contact
        .clone()
        .unwrap_or_else(|| tx.phone_number.clone())
}

fn confirmation_text(tx: &Transaction, plan: &DataPlan) -> String {
    format!(
        "DataWaves: your {}GB {} bundle for {} is confirmed. Amount GHS {}. Ref {}.",
        plan.size_gb,
        tx.network.to_uppercase(),
        tx.phone_number,
        tx.amount,
        tx.payment_reference,
    )
}

fn confirmation_html(tx: &Transaction, user: &User, plan: &DataPlan) -> String {
    format!(
        "<p>Hi {},</p>\
         <p>Your <strong>{}GB {}</strong> bundle for {} has been delivered.</p>\
         <p>Amount charged: GHS {}<br>Reference: {}</p>",
        user.full_name,
        plan.size_gb,
        tx.network.to_uppercase(),
        tx.phone_number,
        tx.amount,
        tx.payment_reference,
    )
}

fn failure_text(tx: &Transaction, reason: &str) -> String {
    format!(
        "DataWaves: your bundle purchase {} could not be completed: {}. Any charge will be reversed.",
        tx.payment_reference, reason,
    )
}

fn failure_html(tx: &Transaction, user: &User, reason: &str) -> String {
    format!(
        "<p>Hi {},</p>\
         <p>Your bundle purchase <strong>{}</strong> could not be completed.</p>\
         <p>Reason: {}</p>\
         <p>Any charge made will be reversed.</p>",
        user.full_name, tx.payment_reference, reason,
    )
}

fn admin_alert_text(subject: &str, details: &Value) -> String {
    format!("DataWaves alert: {subject} {details}")
}

fn log_outcomes(kind: &str, reference: &str, records: &[DispatchRecord]) {
    for record in records {
        match &record.outcome {
            Ok(DispatchStatus::Sent) => {
                tracing::info!(kind, reference, channel = ?record.channel, "notification sent")
            }
            Ok(DispatchStatus::Skipped) => {
                tracing::info!(kind, reference, channel = ?record.channel, "notification skipped")
            }
            Err(e) => {
                tracing::error!(kind, reference, channel = ?record.channel, error = %e, "notification failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    use crate::db::models::NewTransaction;
    use crate::domain::{ConfirmationMethod, Network};

    fn fixtures(method: ConfirmationMethod) -> (Transaction, User, DataPlan) {
        let user = User {
            id: Uuid::new_v4(),
            full_name: "Ama Mensah".to_string(),
            email: "ama@example.com".to_string(),
            phone: None,
            role: "user".to_string(),
            api_key: "dw_key".to_string(),
            created_at: Utc::now(),
        };
        let plan = DataPlan {
            id: Uuid::new_v4(),
            provider: "mtn".to_string(),
            size_gb: BigDecimal::from(5),
            base_price: BigDecimal::from_str("20.00").unwrap(),
            created_at: Utc::now(),
        };
        let tx = Transaction::pending(NewTransaction {
            user_id: user.id,
            plan_id: plan.id,
            network: Network::Mtn,
            phone_number: "+233241234567".to_string(),
            amount: BigDecimal::from_str("21.00").unwrap(),
            payment_reference: "dw_ref_1".to_string(),
            confirmation_method: method,
            confirmation_contact: Some("+233241234567".to_string()),
        });
        (tx, user, plan)
    }

    fn notifier(server_url: &str, admin_email: Option<String>) -> Notifier {
        Notifier::new(
            EmailClient::new(
                format!("{server_url}/emails"),
                Some("mail-key".to_string()),
                "no-reply@datawaves.app".to_string(),
            ),
            SmsClient::new(format!("{server_url}/sms"), Some("sms-key".to_string())),
            admin_email,
            None,
        )
    }

    fn email_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/emails")
            .with_status(200)
            .with_body("{}")
    }

    fn sms_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/sms")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true}"#)
    }

    #[tokio::test]
    async fn test_confirmation_goes_to_both_channels() {
        let mut server = mockito::Server::new_async().await;
        let email = email_mock(&mut server).expect(1).create_async().await;
        let sms = sms_mock(&mut server).expect(1).create_async().await;

        // preference is email-only but outcome notifications ignore it
        let (tx, user, plan) = fixtures(ConfirmationMethod::Email);
        let records = notifier(&server.url(), None)
            .send_purchase_confirmation(&tx, &user, &plan)
            .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.delivered()));
        email.assert_async().await;
        sms.assert_async().await;
    }

    #[tokio::test]
    async fn test_one_channel_failing_does_not_stop_the_other() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/emails")
            .with_status(500)
            .with_body("relay down")
            .create_async()
            .await;
        let sms = sms_mock(&mut server).expect(1).create_async().await;

        let (tx, user, plan) = fixtures(ConfirmationMethod::Both);
        let records = notifier(&server.url(), None)
            .send_purchase_confirmation(&tx, &user, &plan)
            .await;

        let sms_record = records.iter().find(|r| r.channel == Channel::Sms).unwrap();
        let email_record = records.iter().find(|r| r.channel == Channel::Email).unwrap();
        assert!(sms_record.delivered());
        assert!(email_record.outcome.is_err());
        sms.assert_async().await;
    }

    #[tokio::test]
    async fn test_resend_honors_email_only_preference() {
        let mut server = mockito::Server::new_async().await;
        let email = email_mock(&mut server).expect(1).create_async().await;
        let sms = sms_mock(&mut server).expect(0).create_async().await;

        let (tx, user, plan) = fixtures(ConfirmationMethod::Email);
        let records = notifier(&server.url(), None)
            .resend_receipt(&tx, &user, &plan)
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, Channel::Email);
        email.assert_async().await;
        sms.assert_async().await;
    }

    #[tokio::test]
    async fn test_resend_honors_sms_only_preference() {
        let mut server = mockito::Server::new_async().await;
        let email = email_mock(&mut server).expect(0).create_async().await;
        let sms = sms_mock(&mut server).expect(1).create_async().await;

        let (tx, user, plan) = fixtures(ConfirmationMethod::Sms);
        let records = notifier(&server.url(), None)
            .resend_receipt(&tx, &user, &plan)
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, Channel::Sms);
        email.assert_async().await;
        sms.assert_async().await;
    }

    #[tokio::test]
    async fn test_resend_both_sends_two() {
        let mut server = mockito::Server::new_async().await;
        let email = email_mock(&mut server).expect(1).create_async().await;
        let sms = sms_mock(&mut server).expect(1).create_async().await;

        let (tx, user, plan) = fixtures(ConfirmationMethod::Both);
        let records = notifier(&server.url(), None)
            .resend_receipt(&tx, &user, &plan)
            .await;

        assert_eq!(records.len(), 2);
        email.assert_async().await;
        sms.assert_async().await;
    }

    #[tokio::test]
    async fn test_admin_alert_uses_admin_address() {
        let mut server = mockito::Server::new_async().await;
        let email = server
            .mock("POST", "/emails")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "to": "ops@datawaves.app",
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let records = notifier(&server.url(), Some("ops@datawaves.app".to_string()))
            .send_admin_alert(
                "Transaction failed",
                &serde_json::json!({"reference": "dw_ref_1"}),
            )
            .await;

        assert_eq!(records.len(), 1);
        email.assert_async().await;
    }

    #[tokio::test]
    async fn test_admin_alert_without_contacts_is_dropped() {
        let mut server = mockito::Server::new_async().await;
        let email = email_mock(&mut server).expect(0).create_async().await;

        let records = notifier(&server.url(), None)
            .send_admin_alert("Low balance", &serde_json::json!({"balance": 12.5}))
            .await;

        assert!(records.is_empty());
        email.assert_async().await;
    }

    #[test]
    fn test_sms_recipient_prefers_stored_contact() {
        let (mut tx, _, _) = fixtures(ConfirmationMethod::Both);
        tx.confirmation_contact = Some("+233209999999".to_string());
        assert_eq!(sms_recipient(&tx), "+233209999999");

        tx.confirmation_contact = None;
        assert_eq!(sms_recipient(&tx), tx.phone_number);
    }

    #[test]
    fn test_message_texts_mention_reference() {
        let (tx, user, plan) = fixtures(ConfirmationMethod::Both);
        assert!(confirmation_text(&tx, &plan).contains("dw_ref_1"));
        assert!(confirmation_text(&tx, &plan).contains("5GB"));
        assert!(failure_text(&tx, "aggregator down").contains("aggregator down"));
        assert!(confirmation_html(&tx, &user, &plan).contains("Ama Mensah"));
    }
}
