pub mod core;
pub mod error;
pub mod external;
pub mod ledger;
pub mod library;
pub mod marketplace;
pub mod server;

pub use core::{Config, HealthChecker, Metrics};
pub use error::{MarketError, MarketResult};
