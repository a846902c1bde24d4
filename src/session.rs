use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{error, info, warn};
use url::Url;

use crate::chain::{ChainClient, DerivedAccount, RawTransaction};
use crate::config::Config;
use crate::ephemeral::{generate_state, EphemeralKeyPair};
use crate::error::Error;
use crate::store::{StateStore, StoredSession};
use crate::token::{decode_id_token, Identity};
use crate::types::ChainAddress;

/// Application cache that must be emptied when the session ends, so no stale
/// authenticated data remains visible. The receipt verifier registers itself
/// through this.
pub trait CacheInvalidator: Send + Sync {
    fn clear(&self);
}

/// Decision parsed from the redirect-return URL fragment.
///
/// The three cases are mutually exclusive and checked in this order: a
/// provider error, a returned identity token, or nothing (plain page load).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The provider reported a login error.
    Error(String),
    /// The provider returned an identity token.
    Token {
        id_token: String,
        state: Option<String>,
    },
    /// No redirect parameters present.
    None,
}

/// Pure decision function over the URL fragment; the side-effecting redirect
/// handling lives in [`SessionManager::handle_startup`].
#[must_use]
pub fn parse_redirect_fragment(fragment: &str) -> RedirectOutcome {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
    let mut id_token = None;
    let mut state = None;
    let mut provider_error = None;
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        match key.as_ref() {
            "error" => provider_error = Some(value.into_owned()),
            "id_token" => id_token = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = provider_error {
        return RedirectOutcome::Error(error);
    }
    if let Some(id_token) = id_token {
        return RedirectOutcome::Token { id_token, state };
    }
    RedirectOutcome::None
}

struct Session {
    account: DerivedAccount,
    #[allow(dead_code)] // held for the session's lifetime; re-validated via the account
    ephemeral: EphemeralKeyPair,
    identity: Identity,
    address: ChainAddress,
}

/// Owns the lifecycle of the keyless signing session: ephemeral key
/// generation, the login redirect, token exchange into a derived account,
/// persistence and restoration, signing operations, and logout.
///
/// All login and session errors are absorbed into a clean unauthenticated
/// state — "no session" is always safe and representable — while signing
/// errors propagate to the caller.
pub struct SessionManager<S, C> {
    config: Config,
    store: S,
    chain: C,
    http: reqwest::Client,
    session: Option<Session>,
    caches: Vec<Arc<dyn CacheInvalidator>>,
    bootstrapped: Option<ChainAddress>,
}

impl<S: StateStore, C: ChainClient> SessionManager<S, C> {
    #[must_use]
    pub fn new(config: Config, store: S, chain: C) -> Self {
        Self {
            config,
            store,
            chain,
            http: reqwest::Client::new(),
            session: None,
            caches: Vec::new(),
            bootstrapped: None,
        }
    }

    /// Register a cache to be emptied on logout.
    pub fn register_cache(&mut self, cache: Arc<dyn CacheInvalidator>) {
        self.caches.push(cache);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Identity of the signed-in user, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    /// On-chain address of the signed-in user, if any.
    #[must_use]
    pub fn address(&self) -> Option<&ChainAddress> {
        self.session.as_ref().map(|s| &s.address)
    }

    /// Start a new login attempt.
    ///
    /// Generates fresh ephemeral key material and an anti-forgery state
    /// value, REPLACES the persisted record with exactly those two values
    /// (any prior account, identity, or in-flight state is discarded), and
    /// returns the provider authorization URL. Navigating to it is the
    /// caller's single isolated side effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no client id is configured; the error
    /// is logged and no state is written.
    pub fn begin_login(&mut self) -> Result<Url, Error> {
        if self.config.client_id.is_empty() {
            let err = Error::Config("missing OAuth client id".into());
            error!(%err, "cannot begin login");
            return Err(err);
        }

        let ephemeral = EphemeralKeyPair::generate(self.config.key_ttl);
        let state = generate_state();
        StoredSession {
            ephemeral_key_pair: Some(STANDARD.encode(ephemeral.to_bytes())),
            oauth_state: Some(state.clone()),
            ..StoredSession::default()
        }
        .save(&self.store);
        self.session = None;
        self.bootstrapped = None;

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("response_type", "id_token")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("nonce", ephemeral.nonce())
            .append_pair("state", &state);
        Ok(url)
    }

    /// Process the page-load state exactly once, before anything else touches
    /// the persisted record: a provider error clears the in-flight attempt, a
    /// returned token completes it, and a plain load restores from storage.
    pub async fn handle_startup(&mut self, fragment: Option<&str>) {
        match fragment.map_or(RedirectOutcome::None, parse_redirect_fragment) {
            RedirectOutcome::Error(provider_error) => {
                error!(error = %provider_error, "login failed at provider");
                self.clear_session();
            }
            RedirectOutcome::Token { id_token, state } => {
                self.complete_login(&id_token, state.as_deref()).await;
            }
            RedirectOutcome::None => self.restore_session().await,
        }
    }

    /// Exchange a returned identity token for a session.
    ///
    /// Reads the persisted record first — the redirect was a full page
    /// navigation, so the key material may not be in memory. Any failure
    /// (missing or expired key material, state mismatch, token or derivation
    /// or validity failure) discards the attempt and leaves a clean
    /// unauthenticated state.
    pub async fn complete_login(&mut self, id_token: &str, returned_state: Option<&str>) {
        if let Err(err) = self.try_complete_login(id_token, returned_state).await {
            error!(%err, "failed to establish keyless session");
            self.clear_session();
        }
    }

    async fn try_complete_login(
        &mut self,
        id_token: &str,
        returned_state: Option<&str>,
    ) -> Result<(), Error> {
        let mut record = StoredSession::load(&self.store);

        let encoded = record.ephemeral_key_pair.clone().ok_or_else(|| {
            Error::Session("no ephemeral key material for this login attempt".into())
        })?;
        if let Some(expected) = record.oauth_state.as_deref() {
            if returned_state != Some(expected) {
                return Err(Error::Session("login state mismatch".into()));
            }
        }

        let bytes = STANDARD
            .decode(&encoded)
            .map_err(|_| Error::Session("malformed ephemeral key material".into()))?;
        let ephemeral = EphemeralKeyPair::from_bytes(&bytes)?;
        if ephemeral.is_expired() {
            return Err(Error::Session("ephemeral key material expired".into()));
        }

        let identity = decode_id_token(id_token)?;
        let account = self.chain.derive_account(id_token, &ephemeral).await?;
        self.chain.check_validity(&account).await?;

        let address = account.address.clone();
        info!(address = %address, "derived keyless address");

        record.account = Some(STANDARD.encode(account.to_bytes()));
        record.user = Some(identity.clone());
        record.oauth_state = None;
        record.save(&self.store);

        self.session = Some(Session {
            account,
            ephemeral,
            identity,
            address: address.clone(),
        });
        self.ensure_vault(&address).await;
        Ok(())
    }

    /// Restore a persisted session, the sole startup path when no redirect
    /// parameters are present.
    ///
    /// A record whose account or key material is absent, malformed, or
    /// expired yields no session. The slot is cleared only when no ephemeral
    /// key material is salvageable — a key-material-only record is kept so a
    /// pending login redirect can still complete.
    pub async fn restore_session(&mut self) {
        let record = StoredSession::load(&self.store);
        match restore_from_record(&record) {
            Some(session) => {
                let address = session.address.clone();
                self.session = Some(session);
                self.ensure_vault(&address).await;
            }
            None => {
                if record.account.is_some() {
                    warn!("failed to restore persisted session");
                }
                if record.ephemeral_key_pair.is_none() && !record.is_empty() {
                    self.clear_session();
                }
            }
        }
    }

    /// Sign an arbitrary message with the session account.
    ///
    /// # Errors
    ///
    /// [`Error::SignerUnavailable`] when no session is established; validity
    /// and signing failures propagate as-is.
    pub async fn sign_message(&self, message: &[u8]) -> Result<String, Error> {
        let session = self.session.as_ref().ok_or(Error::SignerUnavailable)?;
        self.chain.check_validity(&session.account).await?;
        self.chain.sign_message(&session.account, message).await
    }

    /// Sign a transaction without submitting it.
    ///
    /// # Errors
    ///
    /// Same contract as [`sign_message`](Self::sign_message).
    pub async fn sign_transaction(&self, transaction: &RawTransaction) -> Result<String, Error> {
        let session = self.session.as_ref().ok_or(Error::SignerUnavailable)?;
        self.chain.check_validity(&session.account).await?;
        self.chain
            .sign_transaction(&session.account, transaction)
            .await
    }

    /// Sign and submit a transaction, returning its hash once the ledger
    /// acknowledges inclusion.
    ///
    /// # Errors
    ///
    /// Same contract as [`sign_message`](Self::sign_message).
    pub async fn sign_and_submit(&self, transaction: &RawTransaction) -> Result<String, Error> {
        let session = self.session.as_ref().ok_or(Error::SignerUnavailable)?;
        self.chain.check_validity(&session.account).await?;
        self.chain
            .sign_and_submit(&session.account, transaction)
            .await
    }

    /// End the session: reset the demo state (best effort), erase the
    /// persisted record and in-memory session, and empty every registered
    /// cache.
    pub async fn logout(&mut self) {
        self.reset_demo_state().await;
        self.clear_session();
        for cache in &self.caches {
            cache.clear();
        }
    }

    fn clear_session(&mut self) {
        self.session = None;
        self.bootstrapped = None;
        StoredSession::default().save(&self.store);
    }

    async fn reset_demo_state(&self) {
        let Ok(url) = self.config.api_base.join("api/demo/reset") else {
            return;
        };
        match self.http.post(url).send().await {
            Ok(response) if !response.status().is_success() => {
                error!(status = %response.status(), "demo state reset rejected");
            }
            Err(err) => error!(%err, "failed to reset demo state"),
            Ok(_) => {}
        }
    }

    /// Best-effort vault bootstrap, once per distinct newly-established
    /// address.
    async fn ensure_vault(&mut self, address: &ChainAddress) {
        if self.bootstrapped.as_ref() == Some(address) {
            return;
        }
        self.bootstrapped = Some(address.clone());

        let Ok(url) = self.config.api_base.join("api/chain/bootstrap-vault") else {
            return;
        };
        let body = serde_json::json!({ "address": address });
        match self.http.post(url).json(&body).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "failed to bootstrap user vault");
            }
            Err(err) => warn!(%err, "error bootstrapping user vault"),
            Ok(_) => {}
        }
    }
}

fn restore_from_record(record: &StoredSession) -> Option<Session> {
    let account_b64 = record.account.as_ref()?;
    let key_b64 = record.ephemeral_key_pair.as_ref()?;
    let account = DerivedAccount::from_bytes(&STANDARD.decode(account_b64).ok()?).ok()?;
    let ephemeral = EphemeralKeyPair::from_bytes(&STANDARD.decode(key_b64).ok()?).ok()?;
    if account.is_expired() || ephemeral.is_expired() {
        return None;
    }
    let address = account.address.clone();
    let identity = record.user.clone().unwrap_or(Identity {
        sub: account.uid.clone(),
        name: None,
        email: None,
    });
    Some(Session {
        account,
        ephemeral,
        identity,
        address,
    })
}
