use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::token::Identity;

/// Well-known slot holding the persisted session record.
pub const SESSION_KEY: &str = "giving_session_v1";

/// Minimal key-value port over the host's persistent storage
/// (browser-local storage, a file, or an in-memory map in tests).
pub trait StateStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory [`StateStore`] for tests and non-persistent hosts.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("store lock poisoned").remove(key);
    }
}

/// Persisted session record, serialized as one JSON document under
/// [`SESSION_KEY`].
///
/// Exclusively owned by the session manager. A new login attempt REPLACES the
/// whole record (never merges) so a stale anti-forgery state value cannot
/// validate a newer redirect response. Saving an all-empty record removes the
/// slot entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Base64-encoded [`DerivedAccount`](crate::chain::DerivedAccount) bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Base64-encoded [`EphemeralKeyPair`](crate::ephemeral::EphemeralKeyPair) bytes.
    #[serde(
        default,
        rename = "ephemeralKeyPair",
        skip_serializing_if = "Option::is_none"
    )]
    pub ephemeral_key_pair: Option<String>,
    /// Anti-forgery state value; present only while a login is in flight.
    #[serde(default, rename = "oauthState", skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

impl StoredSession {
    /// Load the record from storage. A missing or unparsable slot yields an
    /// empty record (the parse failure is logged, not surfaced).
    pub fn load(store: &impl StateStore) -> Self {
        let Some(raw) = store.get(SESSION_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "failed to parse stored session record");
                Self::default()
            }
        }
    }

    /// Write the record back, removing the slot when nothing remains.
    pub fn save(&self, store: &impl StateStore) {
        if self.is_empty() {
            store.remove(SESSION_KEY);
            return;
        }
        let raw = serde_json::to_string(self).expect("session record serialization");
        store.set(SESSION_KEY, &raw);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.ephemeral_key_pair.is_none()
            && self.oauth_state.is_none()
            && self.user.is_none()
    }
}
