//! End-to-end concurrency test: many buyers race for one listing and the
//! sold total must never exceed the listed quantity.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use license_marketplace::core::Metrics;
use license_marketplace::error::MarketError;
use license_marketplace::external::{
    ContentEntry, InMemoryContentRegistry, InMemoryIdentityResolver,
};
use license_marketplace::ledger::{
    Chain, LedgerQuery, OwnershipCheck, TokenRef, TokenStandard, TransferRecord,
};
use license_marketplace::library::{
    HoldingStore, LibraryHolding, OwnershipVerifier, VerificationCache,
};
use license_marketplace::marketplace::store::connect_sqlite;
use license_marketplace::marketplace::{
    CreateListingRequest, Currency, ListingStatus, ListingStore, MarketplaceProcessor,
};

/// Ledger stub that confirms every ownership query.
struct StaticLedger;

#[async_trait]
impl LedgerQuery for StaticLedger {
    async fn check_ownership(&self, _token: &TokenRef, _candidate: &str) -> OwnershipCheck {
        OwnershipCheck::ConfirmedOwned
    }

    async fn latest_transfer(
        &self,
        _token: &TokenRef,
    ) -> Result<Option<TransferRecord>, MarketError> {
        Ok(None)
    }
}

struct Harness {
    processor: Arc<MarketplaceProcessor>,
    listings: Arc<ListingStore>,
    holdings: Arc<HoldingStore>,
    metrics: Arc<Metrics>,
    db_path: std::path::PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

async fn build_harness(buyers: &[&str]) -> Harness {
    let db_path = std::env::temp_dir().join(format!("market-stress-{}.db", Uuid::new_v4()));
    let path = db_path.to_string_lossy().to_string();

    let pool = connect_sqlite(&path, 5).await.unwrap();
    let listings = Arc::new(ListingStore::from_pool(pool.clone()));
    listings.ensure_schema().await.unwrap();
    let holdings = Arc::new(HoldingStore::from_pool(pool));
    holdings.ensure_schema().await.unwrap();

    let token = TokenRef::new("0xfeed", "7", TokenStandard::Erc1155, Chain::Polygon);

    let registry = Arc::new(InMemoryContentRegistry::new());
    registry
        .insert(ContentEntry {
            content_ref: "feature-1".into(),
            title: "First Feature".into(),
            token_ref: token.clone(),
            registered_owner: "0x5e11e4".into(),
        })
        .await;

    let identity = Arc::new(InMemoryIdentityResolver::new());
    identity.insert("seller", "0x5e11e4").await;
    for buyer in buyers {
        identity.insert(buyer, &format!("0x{}", buyer)).await;
    }

    holdings
        .insert(&LibraryHolding::new_unverified(
            "feature-1",
            token,
            "seller",
            5,
        ))
        .await
        .unwrap();

    let metrics = Arc::new(Metrics::new().unwrap());
    let cache = Arc::new(VerificationCache::new(1800));
    let verifier = Arc::new(OwnershipVerifier::new(
        Arc::new(StaticLedger),
        identity.clone(),
        holdings.clone(),
        cache,
        metrics.clone(),
        8,
    ));

    let processor = Arc::new(MarketplaceProcessor::new(
        listings.clone(),
        holdings.clone(),
        registry,
        identity,
        verifier,
        metrics.clone(),
        30,
    ));

    Harness {
        processor,
        listings,
        holdings,
        metrics,
        db_path,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_buyers_never_oversell() {
    let buyers = [
        "buyer1", "buyer2", "buyer3", "buyer4", "buyer5", "buyer6", "buyer7", "buyer8",
    ];
    let harness = build_harness(&buyers).await;

    let listing = harness
        .processor
        .create_listing(
            "seller",
            CreateListingRequest {
                content_ref: "feature-1".into(),
                quantity: 5,
                price: 12.5,
                currency: Currency::Matic,
                expires_at: None,
            },
        )
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for buyer in buyers {
        let processor = harness.processor.clone();
        let listing_id = listing.id;
        tasks.push(tokio::spawn(async move {
            processor.purchase(listing_id, buyer, 1).await
        }));
    }

    let mut succeeded = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.quantity, 1);
                succeeded += 1;
            }
            Err(MarketError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected purchase error: {}", e),
        }
    }

    assert_eq!(succeeded, 5, "exactly the listed quantity must sell");
    assert_eq!(conflicts, 3);
    assert_eq!(harness.metrics.purchases_total.get(), 5);

    let settled = harness.listings.get(listing.id).await.unwrap().unwrap();
    assert_eq!(settled.status, ListingStatus::Sold);
    assert_eq!(settled.quantity, 0);
    assert!(settled.buyer.is_some());

    // Every successful buyer was credited exactly one unverified holding.
    let mut credited = 0;
    for buyer in buyers {
        if let Some(holding) = harness.holdings.get_active("feature-1", buyer).await.unwrap() {
            assert!(!holding.ownership_verified);
            credited += holding.quantity;
        }
    }
    assert_eq!(credited, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partial_fills_race_down_to_zero() {
    let buyers = ["b1", "b2", "b3", "b4"];
    let harness = build_harness(&buyers).await;

    let listing = harness
        .processor
        .create_listing(
            "seller",
            CreateListingRequest {
                content_ref: "feature-1".into(),
                quantity: 4,
                price: 3.0,
                currency: Currency::Usdc,
                expires_at: None,
            },
        )
        .await
        .unwrap();

    // Each buyer wants 2; only two of the four can be filled.
    let mut tasks = Vec::new();
    for buyer in buyers {
        let processor = harness.processor.clone();
        let listing_id = listing.id;
        tasks.push(tokio::spawn(async move {
            processor.purchase(listing_id, buyer, 2).await
        }));
    }

    let mut sold = 0;
    for task in tasks {
        if let Ok(receipt) = task.await.unwrap() {
            sold += receipt.quantity;
        }
    }

    assert_eq!(sold, 4);
    let settled = harness.listings.get(listing.id).await.unwrap().unwrap();
    assert_eq!(settled.status, ListingStatus::Sold);
    assert_eq!(settled.quantity, 0);
}
