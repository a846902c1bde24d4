#![doc = include_str!("../README.md")]

pub mod chain;
pub mod config;
pub mod ephemeral;
pub mod error;
pub mod receipt;
pub mod session;
pub mod store;
pub mod token;
pub mod types;
pub mod verifier;

// Re-exports for convenient access
pub use chain::{ChainClient, DerivedAccount, RawTransaction};
pub use config::Config;
pub use ephemeral::EphemeralKeyPair;
pub use error::Error;
pub use receipt::{Receipt, ReceiptKind, LEND_AND_DONATE_JOURNEY};
pub use session::{parse_redirect_fragment, CacheInvalidator, RedirectOutcome, SessionManager};
pub use store::{MemoryStore, StateStore, StoredSession, SESSION_KEY};
pub use token::{decode_id_token, Identity};
pub use types::{ChainAddress, JourneyId};
pub use verifier::{ReceiptVerifier, VerificationRecord, VerificationStatus};
