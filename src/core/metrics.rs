use anyhow::Result;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Marketplace counters, exposed in Prometheus text format on /metrics.
pub struct Metrics {
    registry: Registry,
    pub purchases_total: IntCounter,
    pub purchase_conflicts_total: IntCounter,
    pub listings_created_total: IntCounter,
    pub listings_expired_total: IntCounter,
    pub verifications_total: IntCounter,
    pub verification_cache_hits_total: IntCounter,
    pub ledger_query_failures_total: IntCounter,
    pub ownership_changes_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let purchases_total =
            IntCounter::new("marketplace_purchases_total", "Completed purchases")?;
        let purchase_conflicts_total = IntCounter::new(
            "marketplace_purchase_conflicts_total",
            "Purchases rejected by state or quantity conflicts",
        )?;
        let listings_created_total =
            IntCounter::new("marketplace_listings_created_total", "Listings created")?;
        let listings_expired_total =
            IntCounter::new("marketplace_listings_expired_total", "Listings expired")?;
        let verifications_total = IntCounter::new(
            "verification_checks_total",
            "Ownership verifications performed (ledger hits)",
        )?;
        let verification_cache_hits_total = IntCounter::new(
            "verification_cache_hits_total",
            "Ownership verifications served from cache",
        )?;
        let ledger_query_failures_total = IntCounter::new(
            "ledger_query_failures_total",
            "Ledger gateway reads that failed after retries",
        )?;
        let ownership_changes_total = IntCounter::new(
            "verification_ownership_changes_total",
            "Holdings detected as transferred off-platform",
        )?;

        registry.register(Box::new(purchases_total.clone()))?;
        registry.register(Box::new(purchase_conflicts_total.clone()))?;
        registry.register(Box::new(listings_created_total.clone()))?;
        registry.register(Box::new(listings_expired_total.clone()))?;
        registry.register(Box::new(verifications_total.clone()))?;
        registry.register(Box::new(verification_cache_hits_total.clone()))?;
        registry.register(Box::new(ledger_query_failures_total.clone()))?;
        registry.register(Box::new(ownership_changes_total.clone()))?;

        Ok(Self {
            registry,
            purchases_total,
            purchase_conflicts_total,
            listings_created_total,
            listings_expired_total,
            verifications_total,
            verification_cache_hits_total,
            ledger_query_failures_total,
            ownership_changes_total,
        })
    }

    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
