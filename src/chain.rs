use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ephemeral::EphemeralKeyPair;
use crate::error::Error;
use crate::types::ChainAddress;

/// Opaque transaction bytes, built and interpreted by the [`ChainClient`]
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction(pub Vec<u8>);

/// Signing account derived from a verified identity token plus ephemeral key
/// material.
///
/// The on-chain address is a pure function of the derivation; `material` is
/// whatever the ledger SDK needs to reconstruct the signer and is opaque to
/// this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedAccount {
    pub address: ChainAddress,
    /// Subject identifier the account was derived for.
    pub uid: String,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
    pub material: Vec<u8>,
}

impl DerivedAccount {
    /// Whether the derived account has passed its validity window.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Serialize for persistence.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("account serialization")
    }

    /// Reconstruct a persisted account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the bytes are malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Session(format!("malformed account: {e}")))
    }
}

/// Consumer-provided ledger bindings.
///
/// The ledger SDK is an external collaborator; implement this trait over it
/// to give the [`SessionManager`](crate::session::SessionManager) derivation,
/// validity, signing, and submission primitives.
///
/// # Example
///
/// ```rust,ignore
/// impl ChainClient for MyLedgerSdk {
///     async fn derive_account(
///         &self,
///         id_token: &str,
///         ephemeral: &EphemeralKeyPair,
///     ) -> Result<DerivedAccount, giving_keyless::Error> {
///         let signer = self.keyless().derive(id_token, ephemeral).await?;
///         Ok(signer.into())
///     }
///     // ...
/// }
/// ```
pub trait ChainClient: Send + Sync + 'static {
    /// Exchange an identity token plus ephemeral key material for a derived
    /// signing account. Fails on derivation or proof-fetch errors.
    fn derive_account(
        &self,
        id_token: &str,
        ephemeral: &EphemeralKeyPair,
    ) -> impl Future<Output = Result<DerivedAccount, Error>> + Send;

    /// Check the account against the ledger's current validity rules.
    ///
    /// The derivation scheme may be revocable or time-boxed, so this is
    /// re-checked before every signing operation, not just after derivation.
    fn check_validity(
        &self,
        account: &DerivedAccount,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Sign an arbitrary message, returning the signature string.
    fn sign_message(
        &self,
        account: &DerivedAccount,
        message: &[u8],
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Sign a transaction without submitting it.
    fn sign_transaction(
        &self,
        account: &DerivedAccount,
        transaction: &RawTransaction,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Sign and submit a transaction, waiting for ledger inclusion.
    /// Returns the resulting transaction hash.
    fn sign_and_submit(
        &self,
        account: &DerivedAccount,
        transaction: &RawTransaction,
    ) -> impl Future<Output = Result<String, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account(expires_at: OffsetDateTime) -> DerivedAccount {
        DerivedAccount {
            address: "0xfeedface".parse().unwrap(),
            uid: "user-123".into(),
            expires_at,
            material: b"opaque".to_vec(),
        }
    }

    #[test]
    fn byte_roundtrip() {
        let account = test_account(OffsetDateTime::now_utc() + time::Duration::hours(1));
        let restored = DerivedAccount::from_bytes(&account.to_bytes()).unwrap();
        assert_eq!(restored, account);
        assert!(!restored.is_expired());
    }

    #[test]
    fn expiry_is_checked_against_the_clock() {
        let account = test_account(OffsetDateTime::now_utc() - time::Duration::minutes(1));
        assert!(account.is_expired());
    }

    #[test]
    fn malformed_bytes_rejected() {
        assert!(DerivedAccount::from_bytes(b"{").is_err());
    }
}
