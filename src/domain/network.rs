//! Ghana mobile network operators supported for bundle delivery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mtn,
    Telecel,
    AirtelTigo,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported network: {0}")]
pub struct UnsupportedNetwork(pub String);

impl Network {
    pub const ALL: [Network; 3] = [Network::Mtn, Network::Telecel, Network::AirtelTigo];

    /// Canonical lowercase key used in the database and markup table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "mtn",
            Network::Telecel => "telecel",
            Network::AirtelTigo => "airteltigo",
        }
    }

    /// Customer-facing operator name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mtn => "MTN",
            Network::Telecel => "Telecel",
            Network::AirtelTigo => "AirtelTigo",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = UnsupportedNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mtn" => Ok(Network::Mtn),
            "telecel" => Ok(Network::Telecel),
            // AirtelTigo still shows up under its pre-merger brand names.
            "airteltigo" | "airtel" | "tigo" => Ok(Network::AirtelTigo),
            other => Err(UnsupportedNetwork(other.to_string())),
        }
    }
}
