//! Persistence port for the purchase pipeline.
//!
//! Handlers and services talk to `dyn Store`; the Postgres
//! implementation backs production and an in-memory one backs tests.

use async_trait::async_trait;
use sqlx::types::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{DataPlan, NetworkMarkup, Transaction, User};
use crate::domain::TransactionStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError>;

    async fn find_plan_by_id(&self, id: Uuid) -> Result<Option<DataPlan>, StoreError>;

    /// Plans for one provider, or the whole catalog when `provider` is
    /// `None`. Ordered by bundle size.
    async fn list_plans(&self, provider: Option<&str>) -> Result<Vec<DataPlan>, StoreError>;

    async fn create_transaction(&self, tx: &Transaction) -> Result<Transaction, StoreError>;

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Conditionally advances a transaction's status. The update only
    /// applies while the row is still in `from`; the return value says
    /// whether this caller won the claim. Concurrent processors for the
    /// same payment reference rely on this to stay single-shot.
    async fn transition_status(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool, StoreError>;

    /// Stores the aggregator's raw response verbatim for audit.
    async fn set_aggregator_response(
        &self,
        reference: &str,
        response: &serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn load_markups(&self) -> Result<Vec<NetworkMarkup>, StoreError>;

    async fn upsert_markup(
        &self,
        network: &str,
        percent: &BigDecimal,
    ) -> Result<NetworkMarkup, StoreError>;
}
