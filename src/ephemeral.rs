use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::Error;

/// Short-lived key pair generated before a login redirect.
///
/// Its nonce is bound into the identity-token request; the key material is
/// later consumed by the derivation service to produce the signing account.
/// Expiration is evaluated against the real clock at every use — expired key
/// material must never derive a session.
#[derive(Clone)]
pub struct EphemeralKeyPair {
    signing_key: SigningKey,
    expires_at: OffsetDateTime,
    nonce: String,
}

/// Serialized form: secret key bytes plus expiry. The nonce is a pure
/// function of both and is recomputed on load.
#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    secret: [u8; 32],
    #[serde(with = "time::serde::timestamp")]
    expires_at: OffsetDateTime,
}

impl EphemeralKeyPair {
    /// Generate a fresh random key pair expiring `ttl` from now.
    #[must_use]
    pub fn generate(ttl: time::Duration) -> Self {
        let secret: [u8; 32] = rand::rng().random();
        Self::from_parts(secret, OffsetDateTime::now_utc() + ttl)
    }

    pub(crate) fn from_parts(secret: [u8; 32], expires_at: OffsetDateTime) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let nonce = derive_nonce(&signing_key.verifying_key(), expires_at);
        Self {
            signing_key,
            expires_at,
            nonce,
        }
    }

    /// Nonce bound into the login redirect (non-empty, URL-safe).
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// Whether the key material has passed its expiration timestamp.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Public half of the key pair.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Serialize for persistence.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let stored = StoredKeyPair {
            secret: self.signing_key.to_bytes(),
            expires_at: self.expires_at,
        };
        serde_json::to_vec(&stored).expect("key pair serialization")
    }

    /// Reconstruct a persisted key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the bytes are malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let stored: StoredKeyPair = serde_json::from_slice(bytes)
            .map_err(|e| Error::Session(format!("malformed ephemeral key material: {e}")))?;
        Ok(Self::from_parts(stored.secret, stored.expires_at))
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    // Never prints the secret key.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("nonce", &self.nonce)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn derive_nonce(public_key: &VerifyingKey, expires_at: OffsetDateTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key.as_bytes());
    hasher.update(expires_at.unix_timestamp().to_le_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generates a cryptographically random anti-forgery state value for a login
/// attempt.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
