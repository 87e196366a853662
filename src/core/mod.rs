pub mod config;
pub mod health;
pub mod keyed_lock;
pub mod logging;
pub mod metrics;

pub use config::Config;
pub use health::HealthChecker;
pub use metrics::Metrics;
