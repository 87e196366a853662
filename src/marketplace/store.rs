use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::ledger::{Chain, TokenRef, TokenStandard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "sold" => Some(ListingStatus::Sold),
            "cancelled" => Some(ListingStatus::Cancelled),
            "expired" => Some(ListingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ListingStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "MATIC")]
    Matic,
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "USDT")]
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Matic => "MATIC",
            Currency::Eth => "ETH",
            Currency::Usdc => "USDC",
            Currency::Usdt => "USDT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MATIC" => Some(Currency::Matic),
            "ETH" => Some(Currency::Eth),
            "USDC" => Some(Currency::Usdc),
            "USDT" => Some(Currency::Usdt),
            _ => None,
        }
    }
}

/// A seller's standing offer of some quantity of one token.
///
/// Rows are never deleted on completion; terminal states stay for audit.
/// Every mutation bumps `version`, and writers compare-and-swap on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub token_ref: TokenRef,
    pub content_ref: String,
    pub seller: String,
    pub quantity: i64,
    pub price: f64,
    pub currency: Currency,
    pub status: ListingStatus,
    pub expires_at: DateTime<Utc>,
    pub buyer: Option<String>,
    pub transaction_hash: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Listing {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, FromRow)]
struct ListingRow {
    id: Uuid,
    contract_address: String,
    token_id: String,
    standard: String,
    chain: String,
    content_ref: String,
    seller: String,
    quantity: i64,
    price: f64,
    currency: String,
    status: String,
    expires_at: DateTime<Utc>,
    buyer: Option<String>,
    transaction_hash: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl ListingRow {
    fn into_listing(self) -> MarketResult<Listing> {
        let standard = TokenStandard::parse(&self.standard).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad standard in row: {}", self.standard))
        })?;
        let chain = Chain::parse(&self.chain).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad chain in row: {}", self.chain))
        })?;
        let status = ListingStatus::parse(&self.status).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad status in row: {}", self.status))
        })?;
        let currency = Currency::parse(&self.currency).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad currency in row: {}", self.currency))
        })?;

        Ok(Listing {
            id: self.id,
            token_ref: TokenRef {
                contract_address: self.contract_address,
                token_id: self.token_id,
                standard,
                chain,
            },
            content_ref: self.content_ref,
            seller: self.seller,
            quantity: self.quantity,
            price: self.price,
            currency,
            status,
            expires_at: self.expires_at,
            buyer: self.buyer,
            transaction_hash: self.transaction_hash,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub currency: Option<Currency>,
    pub content_ref: Option<String>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_count + limit - 1) / limit
        } else {
            0
        };
        Self {
            items,
            total_count,
            page,
            limit,
            total_pages,
        }
    }
}

pub struct ListingStore {
    pool: SqlitePool,
}

impl ListingStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.initialize_schema().await
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                id TEXT PRIMARY KEY,
                contract_address TEXT NOT NULL,
                token_id TEXT NOT NULL,
                standard TEXT NOT NULL,
                chain TEXT NOT NULL,
                content_ref TEXT NOT NULL,
                seller TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 0),
                price REAL NOT NULL CHECK (price >= 0),
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                expires_at DATETIME NOT NULL,
                buyer TEXT,
                transaction_hash TEXT,
                completed_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_listings_token
            ON listings(contract_address, token_id, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_listings_seller
            ON listings(seller, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_listings_expiry
            ON listings(status, expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("✅ Listing store schema initialized");

        Ok(())
    }

    pub async fn insert(&self, listing: &Listing) -> MarketResult<()> {
        sqlx::query(
            r#"
            INSERT INTO listings (
                id, contract_address, token_id, standard, chain, content_ref,
                seller, quantity, price, currency, status, expires_at,
                buyer, transaction_hash, completed_at, created_at, updated_at, version
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing.id)
        .bind(&listing.token_ref.contract_address)
        .bind(&listing.token_ref.token_id)
        .bind(listing.token_ref.standard.as_str())
        .bind(listing.token_ref.chain.as_str())
        .bind(&listing.content_ref)
        .bind(&listing.seller)
        .bind(listing.quantity)
        .bind(listing.price)
        .bind(listing.currency.as_str())
        .bind(listing.status.as_str())
        .bind(listing.expires_at)
        .bind(&listing.buyer)
        .bind(&listing.transaction_hash)
        .bind(listing.completed_at)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .bind(listing.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> MarketResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ListingRow::into_listing).transpose()
    }

    /// Single-row compare-and-swap carrying the whole purchase effect.
    /// Returns false when the version moved underneath the caller.
    ///
    /// Runs on a caller-supplied connection so the decrement and the
    /// buyer's holding credit can share one transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_purchase(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        expected_version: i64,
        new_quantity: i64,
        new_status: ListingStatus,
        buyer: &str,
        transaction_hash: &str,
        completed_at: DateTime<Utc>,
    ) -> MarketResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET quantity = ?, status = ?, buyer = ?, transaction_hash = ?,
                completed_at = ?, updated_at = ?, version = version + 1
            WHERE id = ? AND version = ? AND status = 'active'
            "#,
        )
        .bind(new_quantity)
        .bind(new_status.as_str())
        .bind(buyer)
        .bind(transaction_hash)
        .bind(completed_at)
        .bind(completed_at)
        .bind(id)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// CAS transition out of `active` for cancel and expire.
    pub async fn transition_status(
        &self,
        id: Uuid,
        expected_version: i64,
        new_status: ListingStatus,
    ) -> MarketResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = ?, updated_at = ?, version = version + 1
            WHERE id = ? AND version = ? AND status = 'active'
            "#,
        )
        .bind(new_status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn update_price(
        &self,
        id: Uuid,
        expected_version: i64,
        new_price: f64,
    ) -> MarketResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET price = ?, updated_at = ?, version = version + 1
            WHERE id = ? AND version = ? AND status = 'active'
            "#,
        )
        .bind(new_price)
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Bulk eager expiry. Touches status/version only; idempotent because
    /// the predicate excludes already-terminal rows.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> MarketResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET status = 'expired', updated_at = ?, version = version + 1
            WHERE status = 'active' AND expires_at <= ?
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn list(
        &self,
        filter: &ListingFilter,
        page: i64,
        limit: i64,
    ) -> MarketResult<Page<Listing>> {
        let (page, limit) = clamp_pagination(page, limit);
        // Default to active listings only, like the public browse view.
        let status = filter.status.unwrap_or(ListingStatus::Active);
        let offset = (page - 1) * limit;

        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings
            WHERE status = ?
              AND (? IS NULL OR currency = ?)
              AND (? IS NULL OR content_ref = ?)
              AND (? IS NULL OR price <= ?)
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(status.as_str())
        .bind(filter.currency.map(|c| c.as_str()))
        .bind(filter.currency.map(|c| c.as_str()))
        .bind(filter.content_ref.as_deref())
        .bind(filter.content_ref.as_deref())
        .bind(filter.max_price)
        .bind(filter.max_price)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM listings
            WHERE status = ?
              AND (? IS NULL OR currency = ?)
              AND (? IS NULL OR content_ref = ?)
              AND (? IS NULL OR price <= ?)
            "#,
        )
        .bind(status.as_str())
        .bind(filter.currency.map(|c| c.as_str()))
        .bind(filter.currency.map(|c| c.as_str()))
        .bind(filter.content_ref.as_deref())
        .bind(filter.content_ref.as_deref())
        .bind(filter.max_price)
        .bind(filter.max_price)
        .fetch_one(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ListingRow::into_listing)
            .collect::<MarketResult<Vec<_>>>()?;

        Ok(Page::new(items, total_count, page, limit))
    }

    /// Active listings for one token, cheapest first.
    pub async fn list_by_token(
        &self,
        contract_address: &str,
        token_id: &str,
        page: i64,
        limit: i64,
    ) -> MarketResult<Page<Listing>> {
        let (page, limit) = clamp_pagination(page, limit);
        let contract = contract_address.to_lowercase();
        let offset = (page - 1) * limit;

        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings
            WHERE contract_address = ? AND token_id = ? AND status = 'active'
            ORDER BY price ASC, created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&contract)
        .bind(token_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM listings
            WHERE contract_address = ? AND token_id = ? AND status = 'active'
            "#,
        )
        .bind(&contract)
        .bind(token_id)
        .fetch_one(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ListingRow::into_listing)
            .collect::<MarketResult<Vec<_>>>()?;

        Ok(Page::new(items, total_count, page, limit))
    }

    pub async fn list_by_seller(
        &self,
        seller: &str,
        show_all: bool,
        page: i64,
        limit: i64,
    ) -> MarketResult<Page<Listing>> {
        let (page, limit) = clamp_pagination(page, limit);
        let offset = (page - 1) * limit;

        let rows = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT * FROM listings
            WHERE seller = ? AND (? OR status = 'active')
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(seller)
        .bind(show_all)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM listings
            WHERE seller = ? AND (? OR status = 'active')
            "#,
        )
        .bind(seller)
        .bind(show_all)
        .fetch_one(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ListingRow::into_listing)
            .collect::<MarketResult<Vec<_>>>()?;

        Ok(Page::new(items, total_count, page, limit))
    }

    /// Units the seller has already committed to active listings for one
    /// token. Used to compute available quantity at listing time.
    pub async fn committed_quantity(
        &self,
        seller: &str,
        contract_address: &str,
        token_id: &str,
    ) -> MarketResult<i64> {
        let committed: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(quantity) FROM listings
            WHERE seller = ? AND contract_address = ? AND token_id = ?
              AND status = 'active'
            "#,
        )
        .bind(seller)
        .bind(contract_address.to_lowercase())
        .bind(token_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(committed.unwrap_or(0))
    }

    /// Retention cleanup: drop terminal rows older than the cutoff.
    pub async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> MarketResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM listings
            WHERE status != 'active' AND updated_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn clamp_pagination(page: i64, limit: i64) -> (i64, i64) {
    (page.max(1), limit.clamp(1, 100))
}

/// Open (creating if needed) the SQLite database both stores share.
pub async fn connect_sqlite(database_path: &str, max_connections: u32) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let connection_string = if database_path.starts_with("sqlite:") {
        database_path.to_string()
    } else {
        format!("sqlite://{}?mode=rwc", database_path)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&connection_string)
        .await?;

    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // One connection so every query sees the same in-memory database.
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing(quantity: i64, price: f64) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            token_ref: TokenRef::new("0xCONTRACT", "7", TokenStandard::Erc1155, Chain::Polygon),
            content_ref: "film-7".into(),
            seller: "seller-1".into(),
            quantity,
            price,
            currency: Currency::Usdc,
            status: ListingStatus::Active,
            expires_at: now + chrono::Duration::days(30),
            buyer: None,
            transaction_hash: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    async fn memory_store() -> ListingStore {
        let store = ListingStore::from_pool(memory_pool().await);
        store.initialize_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = memory_store().await;
        let listing = sample_listing(5, 10.0);
        store.insert(&listing).await.unwrap();

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.seller, "seller-1");
        assert_eq!(loaded.quantity, 5);
        assert_eq!(loaded.status, ListingStatus::Active);
        assert_eq!(loaded.token_ref.contract_address, "0xcontract");
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let store = memory_store().await;
        let listing = sample_listing(5, 10.0);
        store.insert(&listing).await.unwrap();

        assert!(store
            .update_price(listing.id, 0, 12.0)
            .await
            .unwrap());
        // Version moved to 1; a writer still holding version 0 loses.
        assert!(!store
            .update_price(listing.id, 0, 15.0)
            .await
            .unwrap());

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.price, 12.0);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_apply_purchase_commits_with_transaction() {
        let store = memory_store().await;
        let listing = sample_listing(5, 10.0);
        store.insert(&listing).await.unwrap();

        let mut tx = store.pool().begin().await.unwrap();
        assert!(store
            .apply_purchase(
                &mut tx,
                listing.id,
                0,
                3,
                ListingStatus::Active,
                "buyer-1",
                "0xdead",
                Utc::now(),
            )
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.quantity, 3);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.buyer.as_deref(), Some("buyer-1"));
    }

    #[tokio::test]
    async fn test_uncommitted_purchase_is_rolled_back() {
        let store = memory_store().await;
        let listing = sample_listing(5, 10.0);
        store.insert(&listing).await.unwrap();

        {
            let mut tx = store.pool().begin().await.unwrap();
            assert!(store
                .apply_purchase(
                    &mut tx,
                    listing.id,
                    0,
                    0,
                    ListingStatus::Sold,
                    "buyer-1",
                    "0xdead",
                    Utc::now(),
                )
                .await
                .unwrap());
            // Dropped without commit.
        }

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ListingStatus::Active);
        assert_eq!(loaded.quantity, 5);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_transition_refuses_terminal_rows() {
        let store = memory_store().await;
        let listing = sample_listing(1, 10.0);
        store.insert(&listing).await.unwrap();

        assert!(store
            .transition_status(listing.id, 0, ListingStatus::Cancelled)
            .await
            .unwrap());
        assert!(!store
            .transition_status(listing.id, 1, ListingStatus::Expired)
            .await
            .unwrap());

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ListingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_expire_due_is_idempotent() {
        let store = memory_store().await;
        let mut listing = sample_listing(3, 10.0);
        listing.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.insert(&listing).await.unwrap();

        assert_eq!(store.expire_due(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.expire_due(Utc::now()).await.unwrap(), 0);

        let loaded = store.get(listing.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ListingStatus::Expired);
        assert_eq!(loaded.quantity, 3);
        assert_eq!(loaded.price, 10.0);
    }

    #[tokio::test]
    async fn test_list_by_token_sorts_cheapest_first() {
        let store = memory_store().await;
        let mut expensive = sample_listing(1, 50.0);
        let mut cheap = sample_listing(1, 5.0);
        expensive.id = Uuid::new_v4();
        cheap.id = Uuid::new_v4();
        store.insert(&expensive).await.unwrap();
        store.insert(&cheap).await.unwrap();

        let page = store
            .list_by_token("0xcontract", "7", 1, 10)
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items[0].price, 5.0);
    }

    #[tokio::test]
    async fn test_pagination_counts() {
        let store = memory_store().await;
        for _ in 0..5 {
            let mut l = sample_listing(1, 10.0);
            l.id = Uuid::new_v4();
            store.insert(&l).await.unwrap();
        }

        let page = store
            .list(&ListingFilter::default(), 2, 2)
            .await
            .unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.page, 2);
    }

    #[tokio::test]
    async fn test_committed_quantity_sums_active_only() {
        let store = memory_store().await;
        let mut a = sample_listing(3, 10.0);
        let mut b = sample_listing(2, 11.0);
        let mut cancelled = sample_listing(4, 9.0);
        a.id = Uuid::new_v4();
        b.id = Uuid::new_v4();
        cancelled.id = Uuid::new_v4();
        cancelled.status = ListingStatus::Cancelled;
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();
        store.insert(&cancelled).await.unwrap();

        let committed = store
            .committed_quantity("seller-1", "0xCONTRACT", "7")
            .await
            .unwrap();
        assert_eq!(committed, 5);
    }
}
