use anyhow::Result;
use std::sync::Arc;

use license_marketplace::core::{self, Config, HealthChecker, Metrics};
use license_marketplace::external::{InMemoryContentRegistry, InMemoryIdentityResolver};
use license_marketplace::ledger::{LedgerGatewayClient, LedgerQuery};
use license_marketplace::library::{HoldingStore, OwnershipVerifier, VerificationCache};
use license_marketplace::marketplace::store::connect_sqlite;
use license_marketplace::marketplace::{
    AnalyticsAggregator, ExpirationSweeper, ListingStore, MarketplaceProcessor,
};
use license_marketplace::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    core::logging::init_logging(&config.monitoring.log_level)?;

    tracing::info!("🚀 License Marketplace starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Ledger gateway: {}", config.ledger.gateway_url);

    let health_checker = Arc::new(HealthChecker::new());
    let metrics = Arc::new(Metrics::new()?);

    // Storage: one pool, so the purchase transaction spans both tables.
    let pool = connect_sqlite(
        &config.database.sqlite_path,
        config.database.max_connections,
    )
    .await?;
    let listings = Arc::new(ListingStore::from_pool(pool.clone()));
    listings.ensure_schema().await?;
    let holdings = Arc::new(HoldingStore::from_pool(pool));
    holdings.ensure_schema().await?;
    health_checker.update_component("database", true).await;
    tracing::info!("✅ SQLite ready at {}", config.database.sqlite_path);

    // Ledger gateway
    let gateway = Arc::new(LedgerGatewayClient::new(config.ledger.clone())?);
    let ledger: Arc<dyn LedgerQuery> = gateway.clone();
    health_checker
        .update_component("ledger_gateway", gateway.ping().await)
        .await;

    // Collaborating services; fed by their own sync jobs in deployment.
    let registry = Arc::new(InMemoryContentRegistry::new());
    let identity = Arc::new(InMemoryIdentityResolver::new());

    // Verification
    let cache = Arc::new(VerificationCache::new(config.verification.cache_ttl_secs));
    let verifier = Arc::new(OwnershipVerifier::new(
        ledger,
        identity.clone(),
        holdings.clone(),
        cache,
        metrics.clone(),
        config.verification.verify_concurrency,
    ));

    // Marketplace
    let processor = Arc::new(MarketplaceProcessor::new(
        listings.clone(),
        holdings.clone(),
        registry.clone(),
        identity,
        verifier.clone(),
        metrics.clone(),
        config.marketplace.default_listing_days,
    ));
    let analytics = Arc::new(AnalyticsAggregator::new(listings.clone()));

    // Background expiration sweep
    let sweeper = Arc::new(ExpirationSweeper::new(
        listings.clone(),
        metrics.clone(),
        config.marketplace.sweep_interval_secs,
        config.marketplace.retention_days,
    ));
    sweeper.start();
    tracing::info!(
        "⏰ Expiration sweeper running every {}s",
        config.marketplace.sweep_interval_secs
    );

    // Periodic gateway health probe
    {
        let health = health_checker.clone();
        let gateway = gateway.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                health
                    .update_component("ledger_gateway", gateway.ping().await)
                    .await;
            }
        });
    }

    let state = AppState {
        processor,
        listings,
        verifier,
        analytics,
        registry,
        health: health_checker,
        metrics,
    };

    let port = config.monitoring.http_port;
    tracing::info!("✅ HTTP API listening on port {}", port);
    warp::serve(server::routes(state))
        .run(([0, 0, 0, 0], port))
        .await;

    Ok(())
}
