pub mod analytics;
pub mod processor;
pub mod store;
pub mod sweeper;

pub use analytics::{AnalyticsAggregator, MarketplaceAnalytics};
pub use processor::{CreateListingRequest, MarketplaceProcessor, PurchaseReceipt};
pub use store::{Currency, Listing, ListingFilter, ListingStatus, ListingStore, Page};
pub use sweeper::ExpirationSweeper;
