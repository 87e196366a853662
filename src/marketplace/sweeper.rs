use chrono::{Duration, Utc};
use std::sync::Arc;

use super::store::ListingStore;
use crate::core::Metrics;
use crate::error::MarketResult;

/// Eager half of listing expiry: a periodic pass transitioning every
/// active listing past its deadline. The purchase path handles the lazy
/// half. Both are idempotent, so overlap is harmless.
pub struct ExpirationSweeper {
    listings: Arc<ListingStore>,
    metrics: Arc<Metrics>,
    sweep_interval_secs: u64,
    retention_days: i64,
}

impl ExpirationSweeper {
    pub fn new(
        listings: Arc<ListingStore>,
        metrics: Arc<Metrics>,
        sweep_interval_secs: u64,
        retention_days: i64,
    ) -> Self {
        Self {
            listings,
            metrics,
            sweep_interval_secs,
            retention_days,
        }
    }

    /// One sweep pass. Returns how many listings were expired.
    pub async fn sweep_once(&self) -> MarketResult<u64> {
        let expired = self.listings.expire_due(Utc::now()).await?;
        if expired > 0 {
            self.metrics.listings_expired_total.inc_by(expired);
            tracing::info!("⏰ Expired {} overdue listings", expired);
        }
        Ok(expired)
    }

    /// Retention cleanup of long-terminal listings. Disabled when
    /// `retention_days` is 0; purely a storage policy, never required
    /// for correctness.
    pub async fn cleanup_once(&self) -> MarketResult<u64> {
        if self.retention_days <= 0 {
            return Ok(0);
        }

        let cutoff = Utc::now() - Duration::days(self.retention_days);
        let removed = self.listings.delete_terminal_before(cutoff).await?;
        if removed > 0 {
            tracing::info!(
                "🧹 Removed {} terminal listings older than {} days",
                removed,
                self.retention_days
            );
        }
        Ok(removed)
    }

    /// Spawn the background sweep loop.
    pub fn start(self: Arc<Self>) {
        let sweeper = self;
        let interval_secs = sweeper.sweep_interval_secs;

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));

            loop {
                interval.tick().await;

                if let Err(e) = sweeper.sweep_once().await {
                    tracing::error!("❌ Expiration sweep failed: {}", e);
                }
                if let Err(e) = sweeper.cleanup_once().await {
                    tracing::error!("❌ Retention cleanup failed: {}", e);
                }
            }
        });

        tracing::info!(
            "✅ Expiration sweeper started (every {}s)",
            interval_secs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Chain, TokenRef, TokenStandard};
    use crate::marketplace::store::{memory_pool, Currency, Listing, ListingStatus};
    use uuid::Uuid;

    async fn store_with_listings() -> (Arc<ListingStore>, Uuid, Uuid) {
        let store = Arc::new(ListingStore::from_pool(memory_pool().await));
        store.ensure_schema().await.unwrap();

        let now = Utc::now();
        let mut overdue = listing(now - Duration::seconds(5));
        let mut live = listing(now + Duration::days(1));
        overdue.id = Uuid::new_v4();
        live.id = Uuid::new_v4();
        store.insert(&overdue).await.unwrap();
        store.insert(&live).await.unwrap();

        (store, overdue.id, live.id)
    }

    fn listing(expires_at: chrono::DateTime<Utc>) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            token_ref: TokenRef::new("0xabc", "1", TokenStandard::Erc721, Chain::Ethereum),
            content_ref: "film-1".into(),
            seller: "seller-1".into(),
            quantity: 2,
            price: 4.0,
            currency: Currency::Eth,
            status: ListingStatus::Active,
            expires_at,
            buyer: None,
            transaction_hash: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue() {
        let (store, overdue_id, live_id) = store_with_listings().await;
        let sweeper = ExpirationSweeper::new(
            store.clone(),
            Arc::new(Metrics::new().unwrap()),
            60,
            0,
        );

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(
            store.get(overdue_id).await.unwrap().unwrap().status,
            ListingStatus::Expired
        );
        assert_eq!(
            store.get(live_id).await.unwrap().unwrap().status,
            ListingStatus::Active
        );
    }

    #[tokio::test]
    async fn test_sweep_twice_is_noop_second_time() {
        let (store, overdue_id, _) = store_with_listings().await;
        let sweeper = ExpirationSweeper::new(
            store.clone(),
            Arc::new(Metrics::new().unwrap()),
            60,
            0,
        );

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);

        let loaded = store.get(overdue_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ListingStatus::Expired);
        assert_eq!(loaded.quantity, 2);
        assert_eq!(loaded.price, 4.0);
    }

    #[tokio::test]
    async fn test_cleanup_disabled_by_default() {
        let (store, overdue_id, _) = store_with_listings().await;
        let sweeper = ExpirationSweeper::new(
            store.clone(),
            Arc::new(Metrics::new().unwrap()),
            60,
            0,
        );
        sweeper.sweep_once().await.unwrap();

        assert_eq!(sweeper.cleanup_once().await.unwrap(), 0);
        assert!(store.get(overdue_id).await.unwrap().is_some());
    }
}
