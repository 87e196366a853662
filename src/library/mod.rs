pub mod cache;
pub mod store;
pub mod verifier;

pub use cache::{VerificationCache, VerificationResult};
pub use store::{DisposalEvent, HoldingStore, LibraryHolding};
pub use verifier::{BatchReport, OwnershipVerifier, VerifyOptions};
