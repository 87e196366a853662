use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::core::keyed_lock::KeyedLock;

/// Outcome of one ownership verification, keyed by content reference.
///
/// `ownership_changed` reports the owned→lost transition itself, not a
/// state: the cached copy always carries `false` so the transition is
/// surfaced exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub content_ref: String,
    pub is_owned: bool,
    pub previously_owned: bool,
    pub verified_at: DateTime<Utc>,
    pub ownership_changed: bool,
    pub new_owner: Option<String>,
}

/// Short-TTL memoization of verification results. Volatile by design;
/// every entry is rebuildable from a fresh ledger read.
pub struct VerificationCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, VerificationResult>>>,
    inflight: KeyedLock<String>,
}

impl VerificationCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: Arc::new(RwLock::new(HashMap::new())),
            inflight: KeyedLock::new(),
        }
    }

    /// Guard held around check-query-store so at most one ledger query is
    /// in flight per content reference; concurrent callers block here and
    /// then hit the freshly stored result.
    pub async fn lock_key(&self, content_ref: &str) -> OwnedMutexGuard<()> {
        self.inflight.acquire(content_ref.to_string()).await
    }

    pub async fn get_fresh(&self, content_ref: &str) -> Option<VerificationResult> {
        let entries = self.entries.read().await;
        let entry = entries.get(content_ref)?;
        if Utc::now() - entry.verified_at < self.ttl {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub async fn store(&self, result: VerificationResult) {
        // The transition flag is not cached; see the type docs.
        let steady = VerificationResult {
            ownership_changed: false,
            ..result
        };
        self.entries
            .write()
            .await
            .insert(steady.content_ref.clone(), steady);
    }

    pub async fn invalidate(&self, content_ref: &str) {
        self.entries.write().await.remove(content_ref);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
