use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::store::{Currency, Listing, ListingStatus, ListingStore};
use crate::core::keyed_lock::KeyedLock;
use crate::core::Metrics;
use crate::error::{MarketError, MarketResult};
use crate::external::{ContentRegistry, IdentityResolver};
use crate::ledger::TokenRef;
use crate::library::{HoldingStore, OwnershipVerifier, VerifyOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub content_ref: String,
    pub quantity: i64,
    pub price: f64,
    pub currency: Currency,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub listing_id: Uuid,
    pub token_ref: TokenRef,
    pub content_ref: String,
    pub seller: String,
    pub buyer: String,
    pub quantity: i64,
    pub price: f64,
    pub currency: Currency,
    pub total: f64,
    pub transaction_hash: String,
    pub purchased_at: DateTime<Utc>,
}

/// Listing lifecycle and purchase protocol.
///
/// Every mutating operation takes the per-listing keyed mutex, then
/// compare-and-swaps on the row version. The lock serializes in-process
/// writers; the CAS catches anything else, so a unit of quantity can be
/// consumed at most once.
pub struct MarketplaceProcessor {
    listings: Arc<ListingStore>,
    holdings: Arc<HoldingStore>,
    registry: Arc<dyn ContentRegistry>,
    identity: Arc<dyn IdentityResolver>,
    verifier: Arc<OwnershipVerifier>,
    metrics: Arc<Metrics>,
    locks: KeyedLock<Uuid>,
    default_listing_days: i64,
}

impl MarketplaceProcessor {
    pub fn new(
        listings: Arc<ListingStore>,
        holdings: Arc<HoldingStore>,
        registry: Arc<dyn ContentRegistry>,
        identity: Arc<dyn IdentityResolver>,
        verifier: Arc<OwnershipVerifier>,
        metrics: Arc<Metrics>,
        default_listing_days: i64,
    ) -> Self {
        Self {
            listings,
            holdings,
            registry,
            identity,
            verifier,
            metrics,
            locks: KeyedLock::new(),
            default_listing_days,
        }
    }

    /// Create a listing for a token the seller verifiably holds.
    ///
    /// Available quantity is the verified holding minus units already
    /// committed to the seller's other active listings of the same token.
    pub async fn create_listing(
        &self,
        seller: &str,
        request: CreateListingRequest,
    ) -> MarketResult<Listing> {
        if request.quantity < 1 {
            return Err(MarketError::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        if request.price < 0.0 || !request.price.is_finite() {
            return Err(MarketError::Validation("price cannot be negative".into()));
        }
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(MarketError::Validation(
                    "expiry must be in the future".into(),
                ));
            }
        }

        let entry = self.registry.resolve(&request.content_ref).await?;
        // Resolvable wallet is required before anything touches the ledger.
        self.identity.resolve_wallet(seller).await?;

        let verification = self
            .verifier
            .verify_ownership(
                &request.content_ref,
                seller,
                &entry.token_ref,
                &VerifyOptions::default(),
            )
            .await?;
        if !verification.is_owned {
            return Err(MarketError::Validation(format!(
                "seller does not hold token for {}",
                request.content_ref
            )));
        }

        let holding = self
            .holdings
            .get_active(&request.content_ref, seller)
            .await?
            .ok_or_else(|| {
                MarketError::Validation(format!(
                    "no library holding for {}",
                    request.content_ref
                ))
            })?;

        let committed = self
            .listings
            .committed_quantity(
                seller,
                &entry.token_ref.contract_address,
                &entry.token_ref.token_id,
            )
            .await?;
        let available = holding.quantity - committed;
        if available < request.quantity {
            return Err(MarketError::Validation(format!(
                "insufficient available quantity: requested {}, available {}",
                request.quantity, available
            )));
        }

        let now = Utc::now();
        let listing = Listing {
            id: Uuid::new_v4(),
            token_ref: entry.token_ref,
            content_ref: request.content_ref,
            seller: seller.to_string(),
            quantity: request.quantity,
            price: request.price,
            currency: request.currency,
            status: ListingStatus::Active,
            expires_at: request
                .expires_at
                .unwrap_or(now + Duration::days(self.default_listing_days)),
            buyer: None,
            transaction_hash: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        self.listings.insert(&listing).await?;
        self.metrics.listings_created_total.inc();

        tracing::info!(
            "📜 Listing created: {} x{} of {} @ {} {} by {}",
            listing.id,
            listing.quantity,
            listing.content_ref,
            listing.price,
            listing.currency.as_str(),
            seller
        );

        Ok(listing)
    }

    /// Purchase up to the listed quantity. Linearizable per listing id.
    pub async fn purchase(
        &self,
        listing_id: Uuid,
        buyer: &str,
        quantity: i64,
    ) -> MarketResult<PurchaseReceipt> {
        if quantity < 1 {
            return Err(MarketError::Validation(
                "purchase quantity must be at least 1".into(),
            ));
        }

        let _guard = self.locks.acquire(listing_id).await;

        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {} not found", listing_id)))?;

        if listing.status != ListingStatus::Active {
            self.metrics.purchase_conflicts_total.inc();
            return Err(MarketError::Conflict(format!(
                "listing is {}",
                listing.status.as_str()
            )));
        }

        let now = Utc::now();
        if listing.is_expired_at(now) {
            // Lazy expiry on the purchase path; the sweeper handles the rest.
            if self
                .listings
                .transition_status(listing_id, listing.version, ListingStatus::Expired)
                .await?
            {
                self.metrics.listings_expired_total.inc();
            }
            self.metrics.purchase_conflicts_total.inc();
            return Err(MarketError::Conflict("listing has expired".into()));
        }

        if quantity > listing.quantity {
            self.metrics.purchase_conflicts_total.inc();
            return Err(MarketError::Conflict(format!(
                "insufficient quantity: requested {}, available {}",
                quantity, listing.quantity
            )));
        }

        if buyer == listing.seller {
            return Err(MarketError::Forbidden(
                "cannot purchase your own listing".into(),
            ));
        }

        self.identity.resolve_wallet(buyer).await?;

        let transaction_hash = generate_transaction_ref();
        let new_quantity = listing.quantity - quantity;
        let new_status = if new_quantity == 0 {
            ListingStatus::Sold
        } else {
            ListingStatus::Active
        };

        // The quantity decrement and the buyer's library credit commit
        // together or not at all.
        let mut tx = self.listings.pool().begin().await?;
        let applied = self
            .listings
            .apply_purchase(
                &mut tx,
                listing_id,
                listing.version,
                new_quantity,
                new_status,
                buyer,
                &transaction_hash,
                now,
            )
            .await?;
        if !applied {
            // Version moved under us (another process); nothing was consumed.
            self.metrics.purchase_conflicts_total.inc();
            return Err(MarketError::Conflict(
                "listing was modified concurrently, please retry".into(),
            ));
        }

        // A purchase lands in the buyer's library immediately, unverified
        // until the next reconciliation pass confirms it on the ledger.
        self.holdings
            .credit_holding(&mut tx, &listing.content_ref, &listing.token_ref, buyer, quantity)
            .await?;
        tx.commit().await?;
        self.metrics.purchases_total.inc();

        tracing::info!(
            "💰 Purchase: {} bought {}x {} from {} for {} {} ({})",
            buyer,
            quantity,
            listing.content_ref,
            listing.seller,
            listing.price * quantity as f64,
            listing.currency.as_str(),
            &transaction_hash[..10]
        );

        Ok(PurchaseReceipt {
            listing_id,
            token_ref: listing.token_ref,
            content_ref: listing.content_ref,
            seller: listing.seller,
            buyer: buyer.to_string(),
            quantity,
            price: listing.price,
            currency: listing.currency,
            total: listing.price * quantity as f64,
            transaction_hash,
            purchased_at: now,
        })
    }

    pub async fn cancel(&self, listing_id: Uuid, caller: &str) -> MarketResult<Listing> {
        let _guard = self.locks.acquire(listing_id).await;

        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {} not found", listing_id)))?;

        if listing.seller != caller {
            return Err(MarketError::Forbidden(
                "only the seller can cancel a listing".into(),
            ));
        }
        if listing.status != ListingStatus::Active {
            return Err(MarketError::Conflict(format!(
                "listing is {} and cannot be cancelled",
                listing.status.as_str()
            )));
        }

        if !self
            .listings
            .transition_status(listing_id, listing.version, ListingStatus::Cancelled)
            .await?
        {
            return Err(MarketError::Conflict(
                "listing was modified concurrently, please retry".into(),
            ));
        }

        tracing::info!("❌ Listing cancelled: {} by {}", listing_id, caller);

        self.get_listing(listing_id).await
    }

    pub async fn update_price(
        &self,
        listing_id: Uuid,
        caller: &str,
        new_price: f64,
    ) -> MarketResult<Listing> {
        if new_price <= 0.0 || !new_price.is_finite() {
            return Err(MarketError::Validation(
                "price must be greater than zero".into(),
            ));
        }

        let _guard = self.locks.acquire(listing_id).await;

        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {} not found", listing_id)))?;

        if listing.seller != caller {
            return Err(MarketError::Forbidden(
                "only the seller can update a listing".into(),
            ));
        }
        if listing.status != ListingStatus::Active {
            return Err(MarketError::Conflict(format!(
                "listing is {} and cannot be updated",
                listing.status.as_str()
            )));
        }

        if !self
            .listings
            .update_price(listing_id, listing.version, new_price)
            .await?
        {
            return Err(MarketError::Conflict(
                "listing was modified concurrently, please retry".into(),
            ));
        }

        tracing::info!(
            "💱 Listing {} price updated to {} by {}",
            listing_id,
            new_price,
            caller
        );

        self.get_listing(listing_id).await
    }

    pub async fn get_listing(&self, listing_id: Uuid) -> MarketResult<Listing> {
        self.listings
            .get(listing_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("listing {} not found", listing_id)))
    }
}

/// Opaque marketplace-side transaction reference recorded on a purchase,
/// shaped like a ledger transaction hash.
fn generate_transaction_ref() -> String {
    format!(
        "0x{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
