//! Transaction lifecycle domain types.
//!
//! A purchase moves through `pending -> paid -> success` on the happy
//! path. Payment failure short-circuits `pending -> failed`; delivery
//! failure after payment lands on `paid -> failed`. `success` and
//! `failed` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Success,
    Failed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transaction status: {0}")]
pub struct InvalidStatus(pub String);

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }

    /// Legal transitions of the purchase state machine.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Failed) | (Paid, Success) | (Paid, Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Channels the customer asked to be notified on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMethod {
    Email,
    Sms,
    #[default]
    Both,
}

impl ConfirmationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationMethod::Email => "email",
            ConfirmationMethod::Sms => "sms",
            ConfirmationMethod::Both => "both",
        }
    }

    pub fn includes_email(&self) -> bool {
        matches!(self, ConfirmationMethod::Email | ConfirmationMethod::Both)
    }

    pub fn includes_sms(&self) -> bool {
        matches!(self, ConfirmationMethod::Sms | ConfirmationMethod::Both)
    }
}

impl FromStr for ConfirmationMethod {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ConfirmationMethod::Email),
            "sms" => Ok(ConfirmationMethod::Sms),
            "both" => Ok(ConfirmationMethod::Both),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Outcome reported by the payment gateway for a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Failure,
}
