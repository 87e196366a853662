use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::ledger::{Chain, TokenRef, TokenStandard};

/// The platform's cached belief that an identity controls a token.
///
/// Holdings are never deleted. When reconciliation finds the token gone,
/// the row is flagged `ownership_changed`, which drops it from the active
/// view; a later purchase inserts a fresh row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryHolding {
    pub id: Uuid,
    pub content_ref: String,
    pub token_ref: TokenRef,
    pub owner: String,
    pub quantity: i64,
    pub ownership_verified: bool,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub ownership_changed: bool,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct HoldingRow {
    id: Uuid,
    content_ref: String,
    contract_address: String,
    token_id: String,
    standard: String,
    chain: String,
    owner: String,
    quantity: i64,
    ownership_verified: bool,
    last_verified_at: Option<DateTime<Utc>>,
    ownership_changed: bool,
    acquired_at: DateTime<Utc>,
}

impl HoldingRow {
    fn into_holding(self) -> MarketResult<LibraryHolding> {
        let standard = TokenStandard::parse(&self.standard).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad standard in row: {}", self.standard))
        })?;
        let chain = Chain::parse(&self.chain).ok_or_else(|| {
            MarketError::Internal(anyhow::anyhow!("bad chain in row: {}", self.chain))
        })?;

        Ok(LibraryHolding {
            id: self.id,
            content_ref: self.content_ref,
            token_ref: TokenRef {
                contract_address: self.contract_address,
                token_id: self.token_id,
                standard,
                chain,
            },
            owner: self.owner,
            quantity: self.quantity,
            ownership_verified: self.ownership_verified,
            last_verified_at: self.last_verified_at,
            ownership_changed: self.ownership_changed,
            acquired_at: self.acquired_at,
        })
    }
}

/// Record of a detected off-platform disposal, derived by the
/// reconciliation engine when drift is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposalEvent {
    pub id: Uuid,
    pub content_ref: String,
    pub contract_address: String,
    pub token_id: String,
    pub previous_owner: String,
    pub new_owner: Option<String>,
    pub transaction_hash: Option<String>,
    pub detected_at: DateTime<Utc>,
}

pub struct HoldingStore {
    pool: SqlitePool,
}

impl HoldingStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.initialize_schema().await
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holdings (
                id TEXT PRIMARY KEY,
                content_ref TEXT NOT NULL,
                contract_address TEXT NOT NULL,
                token_id TEXT NOT NULL,
                standard TEXT NOT NULL,
                chain TEXT NOT NULL,
                owner TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 1),
                ownership_verified INTEGER NOT NULL DEFAULT 0,
                last_verified_at DATETIME,
                ownership_changed INTEGER NOT NULL DEFAULT 0,
                acquired_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_holdings_owner
            ON holdings(owner, ownership_changed)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_holdings_content
            ON holdings(content_ref, owner, ownership_changed)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS disposal_events (
                id TEXT PRIMARY KEY,
                content_ref TEXT NOT NULL,
                contract_address TEXT NOT NULL,
                token_id TEXT NOT NULL,
                previous_owner TEXT NOT NULL,
                new_owner TEXT,
                transaction_hash TEXT,
                detected_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("✅ Holding store schema initialized");

        Ok(())
    }

    pub async fn insert(&self, holding: &LibraryHolding) -> MarketResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_on(&mut conn, holding).await
    }

    async fn insert_on(conn: &mut SqliteConnection, holding: &LibraryHolding) -> MarketResult<()> {
        sqlx::query(
            r#"
            INSERT INTO holdings (
                id, content_ref, contract_address, token_id, standard, chain,
                owner, quantity, ownership_verified, last_verified_at,
                ownership_changed, acquired_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(holding.id)
        .bind(&holding.content_ref)
        .bind(&holding.token_ref.contract_address)
        .bind(&holding.token_ref.token_id)
        .bind(holding.token_ref.standard.as_str())
        .bind(holding.token_ref.chain.as_str())
        .bind(&holding.owner)
        .bind(holding.quantity)
        .bind(holding.ownership_verified)
        .bind(holding.last_verified_at)
        .bind(holding.ownership_changed)
        .bind(holding.acquired_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Credit a purchase to the buyer's library on a caller-supplied
    /// connection, so the credit commits with the listing decrement.
    /// Tops up the active holding if one exists, otherwise inserts a
    /// fresh unverified row for the next reconciliation pass to confirm.
    pub async fn credit_holding(
        &self,
        conn: &mut SqliteConnection,
        content_ref: &str,
        token_ref: &TokenRef,
        owner: &str,
        quantity: i64,
    ) -> MarketResult<()> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM holdings
            WHERE content_ref = ? AND owner = ? AND ownership_changed = 0
            ORDER BY acquired_at DESC
            LIMIT 1
            "#,
        )
        .bind(content_ref)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE holdings SET quantity = quantity + ? WHERE id = ?
                    "#,
                )
                .bind(quantity)
                .bind(id)
                .execute(&mut *conn)
                .await?;
                Ok(())
            }
            None => {
                let holding = LibraryHolding::new_unverified(
                    content_ref,
                    token_ref.clone(),
                    owner,
                    quantity,
                );
                Self::insert_on(conn, &holding).await
            }
        }
    }

    /// The live holding for one content and owner, if any. Flagged rows
    /// are excluded; at most one unflagged row exists per pair.
    pub async fn get_active(
        &self,
        content_ref: &str,
        owner: &str,
    ) -> MarketResult<Option<LibraryHolding>> {
        let row = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT * FROM holdings
            WHERE content_ref = ? AND owner = ? AND ownership_changed = 0
            ORDER BY acquired_at DESC
            LIMIT 1
            "#,
        )
        .bind(content_ref)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HoldingRow::into_holding).transpose()
    }

    /// Whether this owner ever held the content, flagged rows included.
    pub async fn ever_held(&self, content_ref: &str, owner: &str) -> MarketResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM holdings WHERE content_ref = ? AND owner = ?
            "#,
        )
        .bind(content_ref)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Active-view library for one owner.
    pub async fn list_for_owner(&self, owner: &str) -> MarketResult<Vec<LibraryHolding>> {
        let rows = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT * FROM holdings
            WHERE owner = ? AND ownership_changed = 0
            ORDER BY acquired_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HoldingRow::into_holding).collect()
    }

    pub async fn mark_verified(&self, id: Uuid, at: DateTime<Utc>) -> MarketResult<()> {
        sqlx::query(
            r#"
            UPDATE holdings
            SET ownership_verified = 1, last_verified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Terminal flag for a drifted holding. The verified flag is cleared
    /// with it so the row can never look live again.
    pub async fn mark_ownership_changed(&self, id: Uuid, at: DateTime<Utc>) -> MarketResult<()> {
        sqlx::query(
            r#"
            UPDATE holdings
            SET ownership_changed = 1, ownership_verified = 0, last_verified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_disposal(&self, event: &DisposalEvent) -> MarketResult<()> {
        sqlx::query(
            r#"
            INSERT INTO disposal_events (
                id, content_ref, contract_address, token_id,
                previous_owner, new_owner, transaction_hash, detected_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id)
        .bind(&event.content_ref)
        .bind(&event.contract_address)
        .bind(&event.token_id)
        .bind(&event.previous_owner)
        .bind(&event.new_owner)
        .bind(&event.transaction_hash)
        .bind(event.detected_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn disposals_for_content(&self, content_ref: &str) -> MarketResult<Vec<DisposalEvent>> {
        #[derive(FromRow)]
        struct EventRow {
            id: Uuid,
            content_ref: String,
            contract_address: String,
            token_id: String,
            previous_owner: String,
            new_owner: Option<String>,
            transaction_hash: Option<String>,
            detected_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM disposal_events
            WHERE content_ref = ?
            ORDER BY detected_at DESC
            "#,
        )
        .bind(content_ref)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DisposalEvent {
                id: r.id,
                content_ref: r.content_ref,
                contract_address: r.contract_address,
                token_id: r.token_id,
                previous_owner: r.previous_owner,
                new_owner: r.new_owner,
                transaction_hash: r.transaction_hash,
                detected_at: r.detected_at,
            })
            .collect())
    }
}

impl LibraryHolding {
    pub fn new_unverified(
        content_ref: impl Into<String>,
        token_ref: TokenRef,
        owner: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_ref: content_ref.into(),
            token_ref,
            owner: owner.into(),
            quantity,
            ownership_verified: false,
            last_verified_at: None,
            ownership_changed: false,
            acquired_at: Utc::now(),
        }
    }
}
