//! Seams to the collaborators this service consumes but does not own:
//! the content registry (token ↔ content ↔ registered owner) and the
//! identity/wallet resolver. Registration and upload live elsewhere;
//! these traits are how their data reaches the marketplace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{MarketError, MarketResult};
use crate::ledger::TokenRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub content_ref: String,
    pub title: String,
    pub token_ref: TokenRef,
    pub registered_owner: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRegistry: Send + Sync {
    /// Resolve a content reference to its token and registered owner.
    async fn resolve(&self, content_ref: &str) -> MarketResult<ContentEntry>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a platform identity to its external wallet address.
    async fn resolve_wallet(&self, identity: &str) -> MarketResult<String>;
}

/// Registry fed by the content service at startup or via sync.
pub struct InMemoryContentRegistry {
    entries: Arc<RwLock<HashMap<String, ContentEntry>>>,
}

impl InMemoryContentRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, entry: ContentEntry) {
        self.entries
            .write()
            .await
            .insert(entry.content_ref.clone(), entry);
    }
}

impl Default for InMemoryContentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentRegistry for InMemoryContentRegistry {
    async fn resolve(&self, content_ref: &str) -> MarketResult<ContentEntry> {
        self.entries
            .read()
            .await
            .get(content_ref)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(format!("content {} not found", content_ref)))
    }
}

/// Wallet table fed by the identity service.
pub struct InMemoryIdentityResolver {
    wallets: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryIdentityResolver {
    pub fn new() -> Self {
        Self {
            wallets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, identity: &str, wallet: &str) {
        self.wallets
            .write()
            .await
            .insert(identity.to_string(), wallet.to_lowercase());
    }
}

impl Default for InMemoryIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityResolver {
    async fn resolve_wallet(&self, identity: &str) -> MarketResult<String> {
        self.wallets
            .read()
            .await
            .get(identity)
            .cloned()
            .ok_or_else(|| {
                MarketError::Validation(format!("user {} has no connected wallet", identity))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Chain, TokenStandard};

    #[tokio::test]
    async fn test_registry_resolve() {
        let registry = InMemoryContentRegistry::new();
        registry
            .insert(ContentEntry {
                content_ref: "film-1".into(),
                title: "First Feature".into(),
                token_ref: TokenRef::new("0xabc", "1", TokenStandard::Erc1155, Chain::Polygon),
                registered_owner: "0xseller".into(),
            })
            .await;

        assert!(registry.resolve("film-1").await.is_ok());
        assert!(matches!(
            registry.resolve("missing").await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolver_missing_wallet_is_validation() {
        let resolver = InMemoryIdentityResolver::new();
        resolver.insert("alice", "0xA11CE").await;

        assert_eq!(resolver.resolve_wallet("alice").await.unwrap(), "0xa11ce");
        assert!(matches!(
            resolver.resolve_wallet("bob").await,
            Err(MarketError::Validation(_))
        ));
    }
}
