//! Ghana phone number validation.
//!
//! Accepted input forms for the same subscriber number:
//! `+233241234567`, `233241234567` and `0241234567`. All canonicalize
//! to E.164 (`+233XXXXXXXXX`). The two digits after the country code
//! identify the carrier.

pub mod screen;

use thiserror::Error;

use crate::domain::Network;

pub const MTN_PREFIXES: &[&str] = &["24", "54", "55", "59"];
pub const TELECEL_PREFIXES: &[&str] = &["20", "50"];
pub const AIRTELTIGO_PREFIXES: &[&str] = &["26", "27", "56", "57"];

pub fn prefixes_for(network: Network) -> &'static [&'static str] {
    match network {
        Network::Mtn => MTN_PREFIXES,
        Network::Telecel => TELECEL_PREFIXES,
        Network::AirtelTigo => AIRTELTIGO_PREFIXES,
    }
}

pub fn network_for_prefix(prefix: &str) -> Option<Network> {
    Network::ALL
        .into_iter()
        .find(|network| prefixes_for(*network).contains(&prefix))
}

/// A number that passed format and carrier checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPhone {
    /// E.164 form, `+233XXXXXXXXX`. This is what gets stored and sent
    /// to the aggregator.
    pub e164: String,
    /// Local dialing form, `0XXXXXXXXX`.
    pub local: String,
    pub network: Network,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("invalid phone number format, expected 0XXXXXXXXX, 233XXXXXXXXX or +233XXXXXXXXX")]
    InvalidFormat,

    #[error("number belongs to {} but {} was selected", detected.display_name(), selected.display_name())]
    WrongNetwork { selected: Network, detected: Network },

    #[error("prefix 0{prefix} does not match any supported carrier")]
    UnknownPrefix { prefix: String },
}

impl PhoneError {
    pub fn code(&self) -> &'static str {
        match self {
            PhoneError::InvalidFormat => "INVALID_FORMAT",
            PhoneError::WrongNetwork { .. } => "WRONG_NETWORK",
            PhoneError::UnknownPrefix { .. } => "UNKNOWN_PREFIX",
        }
    }

    pub fn detected_network(&self) -> Option<Network> {
        match self {
            PhoneError::WrongNetwork { detected, .. } => Some(*detected),
            _ => None,
        }
    }
}

/// Validates `raw` as a subscriber number on `network`.
///
/// Spaces, dashes and similar punctuation are stripped before the
/// format check, so `"+233 24 123 4567"` is accepted.
pub fn validate_for_network(raw: &str, network: Network) -> Result<ValidatedPhone, PhoneError> {
    let phone = detect_network(raw)?;
    if phone.network != network {
        return Err(PhoneError::WrongNetwork {
            selected: network,
            detected: phone.network,
        });
    }
    Ok(phone)
}

/// Detects the carrier from the number alone. Backs the standalone
/// validation endpoint and `validate_for_network`.
pub fn detect_network(raw: &str) -> Result<ValidatedPhone, PhoneError> {
    let cleaned = normalize(raw);

    let subscriber = if let Some(rest) = cleaned.strip_prefix("+233") {
        rest
    } else if let Some(rest) = cleaned.strip_prefix("233") {
        rest
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        rest
    } else {
        return Err(PhoneError::InvalidFormat);
    };

    if subscriber.len() != 9 || !subscriber.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::InvalidFormat);
    }

    let prefix = &subscriber[..2];
    let network = network_for_prefix(prefix).ok_or_else(|| PhoneError::UnknownPrefix {
        prefix: prefix.to_string(),
    })?;

    Ok(ValidatedPhone {
        e164: format!("+233{subscriber}"),
        local: format!("0{subscriber}"),
        network,
    })
}

/// Keeps digits and a leading `+`, drops everything else.
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }
    out
}
