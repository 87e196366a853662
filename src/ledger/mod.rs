pub mod adapter;
pub mod types;

pub use adapter::{LedgerGatewayClient, LedgerQuery};
pub use types::{Chain, OwnershipCheck, TokenRef, TokenStandard, TransferRecord};

#[cfg(test)]
pub use adapter::MockLedgerQuery;
