use serde::{Deserialize, Serialize};

/// Token standard of the license contract. Single-owner standards are
/// checked via the registered owner; balance standards via held balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "ERC-721")]
    Erc721,
    #[serde(rename = "ERC-1155")]
    Erc1155,
}

impl TokenStandard {
    pub fn is_single_owner(&self) -> bool {
        matches!(self, TokenStandard::Erc721)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStandard::Erc721 => "ERC-721",
            TokenStandard::Erc1155 => "ERC-1155",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.contains("721") {
            Some(TokenStandard::Erc721)
        } else if s.contains("1155") {
            Some(TokenStandard::Erc1155)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Bsc,
}

impl Chain {
    pub fn chain_id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Polygon => 137,
            Chain::Bsc => 56,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ethereum" | "eth" => Some(Chain::Ethereum),
            "polygon" | "matic" => Some(Chain::Polygon),
            "bsc" | "binance smart chain" => Some(Chain::Bsc),
            _ => None,
        }
    }
}

/// Ledger address of a license token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub contract_address: String,
    pub token_id: String,
    pub standard: TokenStandard,
    pub chain: Chain,
}

// Deserialization funnels through `new` so the contract casing is
// normalized no matter where the value arrived from. Store queries
// compare against the lowercase form.
impl<'de> Deserialize<'de> for TokenRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            contract_address: String,
            token_id: String,
            standard: TokenStandard,
            chain: Chain,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(TokenRef::new(
            raw.contract_address,
            raw.token_id,
            raw.standard,
            raw.chain,
        ))
    }
}

impl TokenRef {
    pub fn new(
        contract_address: impl Into<String>,
        token_id: impl Into<String>,
        standard: TokenStandard,
        chain: Chain,
    ) -> Self {
        Self {
            contract_address: contract_address.into().to_lowercase(),
            token_id: token_id.into(),
            standard,
            chain,
        }
    }
}

/// Tri-state outcome of a ledger ownership read. `QueryFailed` must never
/// be treated as `ConfirmedNotOwned` by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipCheck {
    ConfirmedOwned,
    ConfirmedNotOwned,
    QueryFailed(String),
}

impl OwnershipCheck {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, OwnershipCheck::QueryFailed(_))
    }
}

/// One entry from the gateway transfer log, used to resolve the new
/// holder after an off-platform transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub from: String,
    pub to: String,
    pub transaction_hash: String,
    pub block_number: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
