use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::sync::Arc;

use super::store::ListingStore;
use crate::error::MarketResult;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyVolume {
    pub currency: String,
    pub listings: i64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceAnalytics {
    pub active_listings: i64,
    pub sold_listings: i64,
    pub average_price: f64,
    pub recent_sales: i64,
    pub volume_by_currency: Vec<CurrencyVolume>,
    pub timestamp: DateTime<Utc>,
}

/// Read-only rollups over the listing store. No locks: mild staleness
/// against in-flight purchases is acceptable for reporting.
pub struct AnalyticsAggregator {
    listings: Arc<ListingStore>,
}

impl AnalyticsAggregator {
    pub fn new(listings: Arc<ListingStore>) -> Self {
        Self { listings }
    }

    pub async fn snapshot(&self) -> MarketResult<MarketplaceAnalytics> {
        let pool = self.listings.pool();

        // SUM/AVG are NULL on an empty table.
        #[derive(FromRow)]
        struct Counts {
            active: Option<i64>,
            sold: Option<i64>,
            average_price: Option<f64>,
        }

        let counts = sqlx::query_as::<_, Counts>(
            r#"
            SELECT
                SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END) AS active,
                SUM(CASE WHEN status = 'sold' THEN 1 ELSE 0 END) AS sold,
                AVG(CASE WHEN status = 'active' THEN price END) AS average_price
            FROM listings
            "#,
        )
        .fetch_one(pool)
        .await?;

        let thirty_days_ago = Utc::now() - Duration::days(30);
        let recent_sales: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM listings
            WHERE status = 'sold' AND completed_at >= ?
            "#,
        )
        .bind(thirty_days_ago)
        .fetch_one(pool)
        .await?;

        #[derive(FromRow)]
        struct VolumeRow {
            currency: String,
            listings: i64,
            volume: Option<f64>,
        }

        let volumes = sqlx::query_as::<_, VolumeRow>(
            r#"
            SELECT currency,
                   COUNT(*) AS listings,
                   SUM(price * quantity) AS volume
            FROM listings
            WHERE status = 'active'
            GROUP BY currency
            ORDER BY volume DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(MarketplaceAnalytics {
            active_listings: counts.active.unwrap_or(0),
            sold_listings: counts.sold.unwrap_or(0),
            average_price: counts.average_price.unwrap_or(0.0),
            recent_sales,
            volume_by_currency: volumes
                .into_iter()
                .map(|v| CurrencyVolume {
                    currency: v.currency,
                    listings: v.listings,
                    volume: v.volume.unwrap_or(0.0),
                })
                .collect(),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Chain, TokenRef, TokenStandard};
    use crate::marketplace::store::{memory_pool, Currency, Listing, ListingStatus};
    use uuid::Uuid;

    fn listing(status: ListingStatus, price: f64, currency: Currency) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            token_ref: TokenRef::new("0xabc", "1", TokenStandard::Erc1155, Chain::Polygon),
            content_ref: "film-1".into(),
            seller: "seller-1".into(),
            quantity: 2,
            price,
            currency,
            status,
            expires_at: now + Duration::days(30),
            buyer: (status == ListingStatus::Sold).then(|| "buyer-1".to_string()),
            transaction_hash: None,
            completed_at: (status == ListingStatus::Sold).then(Utc::now),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_snapshot_aggregates() {
        let store = Arc::new(ListingStore::from_pool(memory_pool().await));
        store.ensure_schema().await.unwrap();

        store
            .insert(&listing(ListingStatus::Active, 10.0, Currency::Usdc))
            .await
            .unwrap();
        store
            .insert(&listing(ListingStatus::Active, 30.0, Currency::Usdc))
            .await
            .unwrap();
        store
            .insert(&listing(ListingStatus::Sold, 50.0, Currency::Eth))
            .await
            .unwrap();

        let analytics = AnalyticsAggregator::new(store);
        let snapshot = analytics.snapshot().await.unwrap();

        assert_eq!(snapshot.active_listings, 2);
        assert_eq!(snapshot.sold_listings, 1);
        assert_eq!(snapshot.average_price, 20.0);
        assert_eq!(snapshot.recent_sales, 1);
        assert_eq!(snapshot.volume_by_currency.len(), 1);
        assert_eq!(snapshot.volume_by_currency[0].currency, "USDC");
        assert_eq!(snapshot.volume_by_currency[0].volume, 80.0);
    }

    #[tokio::test]
    async fn test_snapshot_on_empty_store() {
        let store = Arc::new(ListingStore::from_pool(memory_pool().await));
        store.ensure_schema().await.unwrap();

        let snapshot = AnalyticsAggregator::new(store).snapshot().await.unwrap();
        assert_eq!(snapshot.active_listings, 0);
        assert_eq!(snapshot.average_price, 0.0);
        assert!(snapshot.volume_by_currency.is_empty());
    }
}
