use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::cache::{VerificationCache, VerificationResult};
use super::store::{DisposalEvent, HoldingStore, LibraryHolding};
use crate::core::Metrics;
use crate::error::{MarketError, MarketResult};
use crate::external::IdentityResolver;
use crate::ledger::{LedgerQuery, OwnershipCheck, TokenRef};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyOptions {
    pub force_reverify: bool,
    pub include_history: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemOutcome {
    pub content_ref: String,
    pub result: Option<VerificationResult>,
    pub error: Option<BatchError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub still_owned: usize,
    pub ownership_changed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub items: Vec<BatchItemOutcome>,
    pub summary: BatchSummary,
}

/// Reconciles the platform's cached holdings against ledger ground truth.
///
/// Policy on query failure is uniform and fail-safe: nothing is flipped,
/// nothing is cached, the caller gets a retryable error. Treating a
/// failed read as "not owned" would report still-owned tokens as lost.
pub struct OwnershipVerifier {
    ledger: Arc<dyn LedgerQuery>,
    identity: Arc<dyn IdentityResolver>,
    holdings: Arc<HoldingStore>,
    cache: Arc<VerificationCache>,
    metrics: Arc<Metrics>,
    semaphore: Arc<Semaphore>,
}

impl OwnershipVerifier {
    pub fn new(
        ledger: Arc<dyn LedgerQuery>,
        identity: Arc<dyn IdentityResolver>,
        holdings: Arc<HoldingStore>,
        cache: Arc<VerificationCache>,
        metrics: Arc<Metrics>,
        verify_concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            identity,
            holdings,
            cache,
            metrics,
            semaphore: Arc::new(Semaphore::new(verify_concurrency.max(1))),
        }
    }

    /// Verify one content item for one owner against the ledger.
    ///
    /// Within the TTL and without `force_reverify` no ledger call is made.
    /// The per-content key lock keeps concurrent callers down to a single
    /// in-flight ledger query.
    pub async fn verify_ownership(
        &self,
        content_ref: &str,
        owner: &str,
        token: &TokenRef,
        opts: &VerifyOptions,
    ) -> MarketResult<VerificationResult> {
        let _inflight = self.cache.lock_key(content_ref).await;

        if !opts.force_reverify {
            if let Some(hit) = self.cache.get_fresh(content_ref).await {
                self.metrics.verification_cache_hits_total.inc();
                tracing::debug!("Verification cache hit for {}", content_ref);
                return Ok(hit);
            }
        }

        let wallet = self.identity.resolve_wallet(owner).await?;
        self.metrics.verifications_total.inc();
        let check = self.ledger.check_ownership(token, &wallet).await;
        let holding = self.holdings.get_active(content_ref, owner).await?;
        let now = Utc::now();

        match check {
            OwnershipCheck::QueryFailed(reason) => {
                self.metrics.ledger_query_failures_total.inc();
                tracing::warn!(
                    "Ledger query failed for {} ({}); keeping prior state",
                    content_ref,
                    reason
                );
                Err(MarketError::ExternalQuery(reason))
            }
            OwnershipCheck::ConfirmedOwned => {
                let previously_owned = holding.is_some();
                if let Some(h) = &holding {
                    self.holdings.mark_verified(h.id, now).await?;
                }

                let result = VerificationResult {
                    content_ref: content_ref.to_string(),
                    is_owned: true,
                    previously_owned,
                    verified_at: now,
                    ownership_changed: false,
                    new_owner: None,
                };
                self.cache.store(result.clone()).await;
                Ok(result)
            }
            OwnershipCheck::ConfirmedNotOwned => {
                // Drift is a verified-owned holding now absent on the
                // ledger. An unverified holding never confirmed, so its
                // absence is not a transition.
                let drifted = holding
                    .as_ref()
                    .filter(|h| h.ownership_verified)
                    .cloned();
                let previously_owned = holding.is_some()
                    || self.holdings.ever_held(content_ref, owner).await?;

                let mut new_owner = None;
                if let Some(h) = &drifted {
                    if opts.include_history {
                        new_owner = self.resolve_new_owner(content_ref, h, &wallet, now).await;
                    }

                    self.holdings.mark_ownership_changed(h.id, now).await?;
                    self.metrics.ownership_changes_total.inc();
                    tracing::warn!(
                        "🔁 Ownership drift: {} left {}'s library (new owner: {})",
                        content_ref,
                        owner,
                        new_owner.as_deref().unwrap_or("unknown")
                    );
                }

                let result = VerificationResult {
                    content_ref: content_ref.to_string(),
                    is_owned: false,
                    previously_owned,
                    verified_at: now,
                    ownership_changed: drifted.is_some(),
                    new_owner,
                };
                self.cache.store(result.clone()).await;
                Ok(result)
            }
        }
    }

    /// Resolve the new holder from the ledger transfer log and persist a
    /// disposal event. A failed log read degrades to an unknown new owner
    /// rather than blocking the drift handling.
    async fn resolve_new_owner(
        &self,
        content_ref: &str,
        holding: &LibraryHolding,
        previous_wallet: &str,
        now: chrono::DateTime<Utc>,
    ) -> Option<String> {
        let (new_owner, transaction_hash) =
            match self.ledger.latest_transfer(&holding.token_ref).await {
                Ok(Some(transfer)) => (Some(transfer.to), Some(transfer.transaction_hash)),
                Ok(None) => (None, None),
                Err(e) => {
                    tracing::warn!(
                        "Transfer log lookup failed for {}: {}",
                        content_ref,
                        e
                    );
                    (None, None)
                }
            };

        let event = DisposalEvent {
            id: Uuid::new_v4(),
            content_ref: content_ref.to_string(),
            contract_address: holding.token_ref.contract_address.clone(),
            token_id: holding.token_ref.token_id.clone(),
            previous_owner: previous_wallet.to_string(),
            new_owner: new_owner.clone(),
            transaction_hash,
            detected_at: now,
        };
        if let Err(e) = self.holdings.record_disposal(&event).await {
            tracing::error!("Failed to record disposal event for {}: {}", content_ref, e);
        }

        new_owner
    }

    /// Fan out verification over a set of holdings, bounded by the
    /// configured concurrency. Per-item failures land in the report and
    /// never abort the rest of the batch.
    pub async fn verify_library_batch(
        &self,
        holdings: &[LibraryHolding],
        owner: &str,
        opts: &VerifyOptions,
    ) -> BatchReport {
        let futures = holdings.iter().map(|holding| async move {
            let permit = self.semaphore.acquire().await;
            if permit.is_err() {
                return BatchItemOutcome {
                    content_ref: holding.content_ref.clone(),
                    result: None,
                    error: Some(BatchError {
                        kind: "internal".into(),
                        message: "verification pool closed".into(),
                        retryable: true,
                    }),
                };
            }

            match self
                .verify_ownership(&holding.content_ref, owner, &holding.token_ref, opts)
                .await
            {
                Ok(result) => BatchItemOutcome {
                    content_ref: holding.content_ref.clone(),
                    result: Some(result),
                    error: None,
                },
                Err(e) => BatchItemOutcome {
                    content_ref: holding.content_ref.clone(),
                    result: None,
                    error: Some(BatchError {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    }),
                },
            }
        });

        let items = futures::future::join_all(futures).await;

        let summary = BatchSummary {
            total: items.len(),
            still_owned: items
                .iter()
                .filter(|i| i.result.as_ref().is_some_and(|r| r.is_owned))
                .count(),
            ownership_changed: items
                .iter()
                .filter(|i| i.result.as_ref().is_some_and(|r| r.ownership_changed))
                .count(),
            failed: items.iter().filter(|i| i.error.is_some()).count(),
        };

        tracing::info!(
            "📚 Library batch verified: {} items, {} owned, {} changed, {} failed",
            summary.total,
            summary.still_owned,
            summary.ownership_changed,
            summary.failed
        );

        BatchReport { items, summary }
    }

    /// Convenience wrapper: verify everything in one owner's active view.
    pub async fn verify_library(
        &self,
        owner: &str,
        opts: &VerifyOptions,
    ) -> MarketResult<BatchReport> {
        let holdings = self.holdings.list_for_owner(owner).await?;
        Ok(self.verify_library_batch(&holdings, owner, opts).await)
    }
}
