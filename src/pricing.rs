//! Provider markup table.
//!
//! Markups are held in an `ArcSwap` so the purchase path reads without
//! locking. Updates go through the database first and swap the whole
//! map in on success; a writer mutex keeps concurrent admin updates
//! from clobbering each other.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bigdecimal::BigDecimal;
use tokio::sync::Mutex;

use crate::db::models::NetworkMarkup;
use crate::db::store::Store;
use crate::error::AppError;

pub struct MarkupTable {
    table: ArcSwap<HashMap<String, BigDecimal>>,
    write_lock: Mutex<()>,
}

impl MarkupTable {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, BigDecimal)>) -> Self {
        let map: HashMap<String, BigDecimal> = entries
            .into_iter()
            .map(|(network, percent)| (network.to_lowercase(), percent))
            .collect();
        Self {
            table: ArcSwap::from_pointee(map),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the persisted markups into a fresh table.
    pub async fn load(store: &dyn Store) -> Result<Self, AppError> {
        let rows = store.load_markups().await?;
        Ok(Self::from_entries(
            rows.into_iter().map(|row| (row.network, row.percent)),
        ))
    }

    /// Markup percentage for a provider, zero when none is configured
    /// so unknown providers price at cost.
    pub fn markup(&self, provider: &str) -> BigDecimal {
        let table = self.table.load();
        table
            .get(&provider.to_lowercase())
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0))
    }

    /// Customer price: `base * (100 + markup) / 100`, computed in
    /// exact decimal arithmetic.
    pub fn price(&self, base: &BigDecimal, provider: &str) -> BigDecimal {
        let hundred = BigDecimal::from(100);
        let percent = self.markup(provider);
        (base * (&hundred + percent)) / hundred
    }

    /// Persists a markup change and publishes it to readers. The new
    /// value only becomes visible after the database write succeeds.
    pub async fn set(
        &self,
        store: &dyn Store,
        network: &str,
        percent: BigDecimal,
    ) -> Result<NetworkMarkup, AppError> {
        let network = network.trim().to_lowercase();
        if network.is_empty() {
            return Err(AppError::validation(
                "INVALID_MARKUP",
                "network name must not be empty",
            ));
        }
        if percent < BigDecimal::from(0) {
            return Err(AppError::validation(
                "INVALID_MARKUP",
                "markup percentage must not be negative",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let saved = store.upsert_markup(&network, &percent).await?;

        let mut next = HashMap::clone(&self.table.load_full());
        next.insert(network, saved.percent.clone());
        self.table.store(Arc::new(next));

        Ok(saved)
    }

    pub fn snapshot(&self) -> HashMap<String, BigDecimal> {
        HashMap::clone(&self.table.load_full())
    }
}

impl Default for MarkupTable {
    fn default() -> Self {
        Self::from_entries(std::iter::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn decimal(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn table() -> MarkupTable {
        MarkupTable::from_entries([
            ("mtn".to_string(), decimal("5.0")),
            ("telecel".to_string(), decimal("7.5")),
            ("airteltigo".to_string(), decimal("6.0")),
            ("glo".to_string(), decimal("8.0")),
        ])
    }

    #[test]
    fn test_price_applies_markup_exactly() {
        let table = table();
        assert_eq!(table.price(&decimal("20.00"), "mtn"), decimal("21.00"));
        assert_eq!(table.price(&decimal("35.00"), "telecel"), decimal("37.625"));
        assert_eq!(table.price(&decimal("50"), "glo"), decimal("54"));
    }

    #[test]
    fn test_unknown_provider_prices_at_cost() {
        let table = table();
        assert_eq!(table.price(&decimal("12.50"), "vodacom"), decimal("12.50"));
        assert_eq!(table.markup("vodacom"), decimal("0"));
    }

    #[test]
    fn test_markup_lookup_is_case_insensitive() {
        let table = table();
        assert_eq!(table.markup("MTN"), decimal("5.0"));
    }

    #[test]
    fn test_no_float_drift_on_awkward_percentages() {
        let table = MarkupTable::from_entries([("mtn".to_string(), decimal("0.1"))]);
        assert_eq!(table.price(&decimal("100"), "mtn"), decimal("100.1"));
    }

    #[tokio::test]
    async fn test_set_persists_then_publishes() {
        let store = MemoryStore::new();
        let table = table();

        let saved = table
            .set(&store, "MTN", decimal("9.5"))
            .await
            .expect("markup update should succeed");

        assert_eq!(saved.network, "mtn");
        assert_eq!(table.markup("mtn"), decimal("9.5"));
        let persisted = store.load_markups().await.unwrap();
        assert_eq!(persisted[0].percent, decimal("9.5"));
    }

    #[tokio::test]
    async fn test_set_rejects_negative_percent() {
        let store = MemoryStore::new();
        let table = table();

        let err = table.set(&store, "mtn", decimal("-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        // table unchanged
        assert_eq!(table.markup("mtn"), decimal("5.0"));
    }

    #[tokio::test]
    async fn test_set_rejects_empty_network() {
        let store = MemoryStore::new();
        let table = table();
        let err = table.set(&store, "  ", decimal("5")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::new();
        store.add_markup("mtn", decimal("5.0")).await;
        store.add_markup("telecel", decimal("7.5")).await;

        let table = MarkupTable::load(&store).await.unwrap();
        assert_eq!(table.price(&decimal("20.00"), "mtn"), decimal("21.00"));
        assert_eq!(table.snapshot().len(), 2);
    }
}
