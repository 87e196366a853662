use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::types::{OwnershipCheck, TokenRef, TransferRecord};
use crate::core::config::LedgerConfig;
use crate::error::MarketError;

/// Read-only ledger boundary. The marketplace never talks to the ledger
/// through anything else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Tri-state ownership read for one token against one candidate
    /// address. Transport failure maps to `QueryFailed`, never to
    /// `ConfirmedNotOwned`.
    async fn check_ownership(&self, token: &TokenRef, candidate: &str) -> OwnershipCheck;

    /// Most recent transfer of the token from the gateway transfer log.
    async fn latest_transfer(
        &self,
        token: &TokenRef,
    ) -> Result<Option<TransferRecord>, MarketError>;
}

#[derive(Debug, Clone, Deserialize)]
struct GatewayResponse<T> {
    pub code: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerData {
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceData {
    pub balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferData {
    pub transfers: Vec<TransferRecord>,
}

/// HTTP client for the ledger gateway service.
pub struct LedgerGatewayClient {
    client: Client,
    config: LedgerConfig,
}

impl LedgerGatewayClient {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn token_path(&self, token: &TokenRef) -> String {
        format!(
            "{}/v1/chains/{}/contracts/{}/tokens/{}",
            self.config.gateway_url,
            token.chain.as_str(),
            token.contract_address,
            token.token_id
        )
    }

    /// GET with capped retries and backoff. Retries cover transport
    /// failures only; a parsed gateway error is definitive.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.try_get::<T>(url).await {
                Ok(data) => return Ok(data),
                Err(e) if attempt < self.config.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    tracing::warn!(
                        "Ledger gateway request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt,
                        self.config.max_retries,
                        backoff,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "gateway request failed: {} - {}",
                status,
                error_text
            ));
        }

        let envelope: GatewayResponse<T> = response.json().await?;
        if envelope.code != "ok" {
            return Err(anyhow::anyhow!("gateway error code: {}", envelope.code));
        }

        Ok(envelope.data)
    }

    pub async fn ping(&self) -> bool {
        let url = format!("{}/v1/ping", self.config.gateway_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Ledger gateway ping failed: {}", e);
                false
            }
        }
    }
}

fn is_transient(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<reqwest::Error>() {
        Some(re) => re.is_timeout() || re.is_connect() || re.is_request(),
        None => false,
    }
}

#[async_trait]
impl LedgerQuery for LedgerGatewayClient {
    async fn check_ownership(&self, token: &TokenRef, candidate: &str) -> OwnershipCheck {
        let candidate = candidate.to_lowercase();

        if token.standard.is_single_owner() {
            let url = format!("{}/owner", self.token_path(token));
            match self.get::<OwnerData>(&url).await {
                Ok(data) if data.owner.to_lowercase() == candidate => {
                    OwnershipCheck::ConfirmedOwned
                }
                Ok(_) => OwnershipCheck::ConfirmedNotOwned,
                Err(e) => OwnershipCheck::QueryFailed(e.to_string()),
            }
        } else {
            let url = format!("{}/balance?address={}", self.token_path(token), candidate);
            match self.get::<BalanceData>(&url).await {
                Ok(data) if data.balance > 0 => OwnershipCheck::ConfirmedOwned,
                Ok(_) => OwnershipCheck::ConfirmedNotOwned,
                Err(e) => OwnershipCheck::QueryFailed(e.to_string()),
            }
        }
    }

    async fn latest_transfer(
        &self,
        token: &TokenRef,
    ) -> Result<Option<TransferRecord>, MarketError> {
        let url = format!("{}/transfers?limit=1", self.token_path(token));
        let data = self
            .get::<TransferData>(&url)
            .await
            .map_err(|e| MarketError::ExternalQuery(e.to_string()))?;

        Ok(data.transfers.into_iter().next())
    }
}
