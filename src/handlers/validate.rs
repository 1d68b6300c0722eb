//! Stateless validation endpoints backing the checkout form.

use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::Network;
use crate::validation::{self, prefixes_for};

#[derive(Debug, Deserialize)]
pub struct PhoneValidationRequest {
    pub phone_number: String,
    /// When present the number must belong to this network; otherwise
    /// the carrier is detected from the prefix alone.
    pub network: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhoneValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_network: Option<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl PhoneValidationResponse {
    fn ok(phone: validation::ValidatedPhone) -> Self {
        Self {
            valid: true,
            phone_number: Some(phone.e164),
            local_format: Some(phone.local),
            detected_network: Some(phone.network),
            error: None,
            code: None,
        }
    }

    fn rejected(code: &'static str, error: String, detected: Option<Network>) -> Self {
        Self {
            valid: false,
            phone_number: None,
            local_format: None,
            detected_network: detected,
            error: Some(error),
            code: Some(code),
        }
    }
}

/// Always answers 200; the body carries the verdict. The checkout form
/// calls this as the customer types.
pub async fn validate_phone(
    Json(req): Json<PhoneValidationRequest>,
) -> Json<PhoneValidationResponse> {
    let network = match req.network.as_deref().map(str::parse::<Network>) {
        None => None,
        Some(Ok(network)) => Some(network),
        Some(Err(e)) => {
            return Json(PhoneValidationResponse::rejected(
                "UNSUPPORTED_NETWORK",
                e.to_string(),
                None,
            ));
        }
    };

    let result = match network {
        Some(network) => validation::validate_for_network(&req.phone_number, network),
        None => validation::detect_network(&req.phone_number),
    };

    match result {
        Ok(phone) => Json(PhoneValidationResponse::ok(phone)),
        Err(err) => {
            let detected = err.detected_network();
            Json(PhoneValidationResponse::rejected(
                err.code(),
                err.to_string(),
                detected,
            ))
        }
    }
}

/// Supported networks and their number prefixes, for building the
/// network picker.
pub async fn list_networks() -> Json<Value> {
    let mut networks = serde_json::Map::new();
    for network in Network::ALL {
        networks.insert(
            network.as_str().to_string(),
            json!({
                "name": network.display_name(),
                "prefixes": prefixes_for(network),
            }),
        );
    }
    Json(json!({ "success": true, "networks": networks }))
}
