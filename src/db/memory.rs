//! In-memory `Store` used by unit and router tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::BigDecimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{DataPlan, NetworkMarkup, Transaction, User};
use crate::db::store::{Store, StoreError};
use crate::domain::TransactionStatus;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    plans: HashMap<Uuid, DataPlan>,
    // keyed by payment reference, the pipeline's lookup key
    transactions: HashMap<String, Transaction>,
    markups: HashMap<String, NetworkMarkup>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    pub async fn add_plan(&self, plan: DataPlan) {
        self.inner.write().await.plans.insert(plan.id, plan);
    }

    pub async fn add_markup(&self, network: &str, percent: BigDecimal) {
        self.inner.write().await.markups.insert(
            network.to_string(),
            NetworkMarkup {
                network: network.to_string(),
                percent,
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn transaction_count(&self) -> usize {
        self.inner.read().await.transactions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.api_key == api_key).cloned())
    }

    async fn find_plan_by_id(&self, id: Uuid) -> Result<Option<DataPlan>, StoreError> {
        Ok(self.inner.read().await.plans.get(&id).cloned())
    }

    async fn list_plans(&self, provider: Option<&str>) -> Result<Vec<DataPlan>, StoreError> {
        let inner = self.inner.read().await;
        let mut plans: Vec<DataPlan> = inner
            .plans
            .values()
            .filter(|p| provider.map_or(true, |wanted| p.provider == wanted))
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            a.provider
                .cmp(&b.provider)
                .then_with(|| a.size_gb.cmp(&b.size_gb))
        });
        Ok(plans)
    }

    async fn create_transaction(&self, tx: &Transaction) -> Result<Transaction, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.transactions.contains_key(&tx.payment_reference) {
            return Err(StoreError::Conflict(format!(
                "payment reference already exists: {}",
                tx.payment_reference
            )));
        }
        inner
            .transactions
            .insert(tx.payment_reference.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn find_transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.inner.read().await.transactions.get(reference).cloned())
    }

    async fn transition_status(
        &self,
        reference: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.transactions.get_mut(reference) {
            Some(tx) if tx.status == from.as_str() => {
                tx.status = to.as_str().to_string();
                tx.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_aggregator_response(
        &self,
        reference: &str,
        response: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(tx) = inner.transactions.get_mut(reference) {
            tx.aggregator_response = Some(response.clone());
            tx.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn load_markups(&self) -> Result<Vec<NetworkMarkup>, StoreError> {
        let inner = self.inner.read().await;
        let mut markups: Vec<NetworkMarkup> = inner.markups.values().cloned().collect();
        markups.sort_by(|a, b| a.network.cmp(&b.network));
        Ok(markups)
    }

    async fn upsert_markup(
        &self,
        network: &str,
        percent: &BigDecimal,
    ) -> Result<NetworkMarkup, StoreError> {
        let markup = NetworkMarkup {
            network: network.to_string(),
            percent: percent.clone(),
            updated_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .markups
            .insert(network.to_string(), markup.clone());
        Ok(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use crate::db::models::NewTransaction;
    use crate::domain::{ConfirmationMethod, Network};

    fn pending_transaction(reference: &str) -> Transaction {
        Transaction::pending(NewTransaction {
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            network: Network::Mtn,
            phone_number: "+233241234567".to_string(),
            amount: BigDecimal::from_str("21.00").unwrap(),
            payment_reference: reference.to_string(),
            confirmation_method: ConfirmationMethod::Both,
            confirmation_contact: None,
        })
    }

    #[tokio::test]
    async fn test_create_and_find_by_reference() {
        let store = MemoryStore::new();
        let tx = pending_transaction("ref_1");
        store.create_transaction(&tx).await.unwrap();

        let found = store
            .find_transaction_by_reference("ref_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tx.id);
        assert!(store
            .find_transaction_by_reference("ref_missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_conflicts() {
        let store = MemoryStore::new();
        store
            .create_transaction(&pending_transaction("ref_dup"))
            .await
            .unwrap();
        let err = store
            .create_transaction(&pending_transaction("ref_dup"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_transition_claims_only_once() {
        let store = MemoryStore::new();
        store
            .create_transaction(&pending_transaction("ref_claim"))
            .await
            .unwrap();

        let first = store
            .transition_status("ref_claim", TransactionStatus::Pending, TransactionStatus::Paid)
            .await
            .unwrap();
        let second = store
            .transition_status("ref_claim", TransactionStatus::Pending, TransactionStatus::Paid)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let tx = store
            .find_transaction_by_reference("ref_claim")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, "paid");
    }

    #[tokio::test]
    async fn test_transition_unknown_reference_is_noop() {
        let store = MemoryStore::new();
        let claimed = store
            .transition_status("ref_ghost", TransactionStatus::Pending, TransactionStatus::Paid)
            .await
            .unwrap();
        assert!(!claimed);
    }

    #[tokio::test]
    async fn test_list_plans_filters_by_provider() {
        let store = MemoryStore::new();
        let mtn_plan = DataPlan {
            id: Uuid::new_v4(),
            provider: "mtn".to_string(),
            size_gb: BigDecimal::from(5),
            base_price: BigDecimal::from(20),
            created_at: Utc::now(),
        };
        let telecel_plan = DataPlan {
            id: Uuid::new_v4(),
            provider: "telecel".to_string(),
            size_gb: BigDecimal::from(10),
            base_price: BigDecimal::from(35),
            created_at: Utc::now(),
        };
        store.add_plan(mtn_plan.clone()).await;
        store.add_plan(telecel_plan).await;

        let mtn_only = store.list_plans(Some("mtn")).await.unwrap();
        assert_eq!(mtn_only.len(), 1);
        assert_eq!(mtn_only[0].id, mtn_plan.id);

        let all = store.list_plans(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_markup_replaces_value() {
        let store = MemoryStore::new();
        store
            .upsert_markup("mtn", &BigDecimal::from_str("5.0").unwrap())
            .await
            .unwrap();
        store
            .upsert_markup("mtn", &BigDecimal::from_str("9.5").unwrap())
            .await
            .unwrap();

        let markups = store.load_markups().await.unwrap();
        assert_eq!(markups.len(), 1);
        assert_eq!(markups[0].percent, BigDecimal::from_str("9.5").unwrap());
    }
}
