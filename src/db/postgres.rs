use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{DataPlan, NetworkMarkup, Transaction, User};
use crate::db::store::{Store, StoreError};
use crate::domain::TransactionStatus;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_plan_by_id(&self, id: Uuid) -> Result<Option<DataPlan>, StoreError> {
        let plan = sqlx::query_as::<_, DataPlan>("SELECT * FROM data_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    async fn list_plans(&self, provider: Option<&str>) -> Result<Vec<DataPlan>, StoreError> {
        let plans = match provider {
            Some(provider) => {
                sqlx::query_as::<_, DataPlan>(
                    "SELECT * FROM data_plans WHERE provider = $1 ORDER BY size_gb ASC",
                )
                .bind(provider)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, DataPlan>(
                    "SELECT * FROM data_plans ORDER BY provider ASC, size_gb ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(plans)
    }

    async fn create_transaction(&self, tx: &Transaction) -> Result<Transaction, StoreError> {
        let inserted = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, user_id, plan_id, network, phone_number, amount, status,
                payment_reference, confirmation_method, confirmation_contact,
                aggregator_response, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(tx.plan_id)
        .bind(&tx.network)
        .bind(&tx.phone_number)
        .bind(&tx.amount)
        .bind(&tx.status)
        .bind(&tx.payment_reference)
        .bind(&tx.confirmation_method)
        .bind(&tx.confirmation_contact)
        .bind(&tx.aggregator_response)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(
                format!("payment reference already exists: {}", tx.payment_reference),
            ),
            _ => StoreError::Database(e),
        })?;
        Ok(inserted)
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let tx = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE payment_reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tx)
    }

    async fn transition_status(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = NOW()
            WHERE payment_reference = $2 AND status = $3
            "#,
        )
        .bind(to.as_str())
        .bind(reference)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_aggregator_response(
        &self,
        reference: &str,
        response: &serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE transactions
            SET aggregator_response = $1, updated_at = NOW()
            WHERE payment_reference = $2
            "#,
        )
        .bind(response)
        .bind(reference)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_markups(&self) -> Result<Vec<NetworkMarkup>, StoreError> {
        let markups =
            sqlx::query_as::<_, NetworkMarkup>("SELECT * FROM network_markups ORDER BY network")
                .fetch_all(&self.pool)
                .await?;
        Ok(markups)
    }

    async fn upsert_markup(
        &self,
        network: &str,
        percent: &BigDecimal,
    ) -> Result<NetworkMarkup, StoreError> {
        let markup = sqlx::query_as::<_, NetworkMarkup>(
            r#"
            INSERT INTO network_markups (network, percent, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (network)
            DO UPDATE SET percent = EXCLUDED.percent, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(network)
        .bind(percent)
        .fetch_one(&self.pool)
        .await?;
        Ok(markup)
    }
}
