use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::domain::{ConfirmationMethod, Network};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DataPlan {
    pub id: Uuid,
    pub provider: String,
    pub size_gb: BigDecimal,
    pub base_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub network: String,
    pub phone_number: String,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_reference: String,
    pub confirmation_method: String,
    pub confirmation_contact: Option<String>,
    pub aggregator_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a freshly initiated purchase.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub network: Network,
    pub phone_number: String,
    pub amount: BigDecimal,
    pub payment_reference: String,
    pub confirmation_method: ConfirmationMethod,
    pub confirmation_contact: Option<String>,
}

impl Transaction {
    pub fn pending(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            plan_id: new.plan_id,
            network: new.network.as_str().to_string(),
            phone_number: new.phone_number,
            amount: new.amount,
            status: "pending".to_string(),
            payment_reference: new.payment_reference,
            confirmation_method: new.confirmation_method.as_str().to_string(),
            confirmation_contact: new.confirmation_contact,
            aggregator_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stored preference, falling back to both channels for rows
    /// written before the column existed.
    pub fn confirmation(&self) -> ConfirmationMethod {
        self.confirmation_method
            .parse()
            .unwrap_or(ConfirmationMethod::Both)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NetworkMarkup {
    pub network: String,
    pub percent: BigDecimal,
    pub updated_at: DateTime<Utc>,
}
