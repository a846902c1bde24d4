use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::receipt::Receipt;
use crate::session::CacheInvalidator;
use crate::types::{ChainAddress, JourneyId};

/// Confirmation progress for one transaction reference.
///
/// `Verified` and `Failed` are terminal: no transition leaves them for the
/// same reference until the records are cleared at session end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// An attempt is currently in flight.
    Verifying,
    /// The ledger has not confirmed the operation yet; a retry is scheduled.
    Pending,
    Verified,
    Failed,
}

impl VerificationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Failed)
    }
}

/// Per-reference verification state exposed to presentation code.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    pub status: VerificationStatus,
    /// Best explorer URL seen so far; a later attempt without one never
    /// erases an earlier one.
    pub explorer_url: Option<String>,
    /// Human-readable failure detail, set only in `Failed`.
    pub message: Option<String>,
}

/// Canonical form of a transaction reference: trimmed and lower-cased.
#[must_use]
pub fn normalize_reference(reference: &str) -> String {
    reference.trim().to_ascii_lowercase()
}

/// Whether a reference looks like a ledger transaction hash (`0x` followed by
/// hex digits) rather than an internal mock value.
#[must_use]
pub fn is_tx_reference(reference: &str) -> bool {
    reference
        .strip_prefix("0x")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Injectable delay between polling attempts; tests substitute an immediate
/// or instrumented future.
pub type DelayFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
    #[serde(rename = "explorerUrl")]
    explorer_url: Option<String>,
}

/// Confirms claimed operation references against the app's verification
/// endpoint with a bounded polling loop per reference.
///
/// Clones share all state; at most one polling loop is active per normalized
/// reference, and redundant [`verify`](Self::verify) calls are no-ops.
#[derive(Clone)]
pub struct ReceiptVerifier {
    http: reqwest::Client,
    api_base: Url,
    poll_interval: Duration,
    max_attempts: u32,
    delay: DelayFn,
    records: Arc<Mutex<HashMap<String, VerificationRecord>>>,
    journeys: Arc<Mutex<HashMap<String, JourneyId>>>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl ReceiptVerifier {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            poll_interval: config.poll_interval,
            max_attempts: config.max_attempts,
            delay: Arc::new(|duration| Box::pin(tokio::time::sleep(duration))),
            records: Arc::new(Mutex::new(HashMap::new())),
            journeys: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the inter-attempt delay (tests run all attempts without
    /// wall-clock waits).
    #[must_use]
    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    /// Bind a journey to a reference, overriding the receipt-kind default.
    pub fn register_journey(&self, reference: &str, journey: JourneyId) {
        self.journeys
            .lock()
            .expect("verifier state poisoned")
            .insert(normalize_reference(reference), journey);
    }

    /// Snapshot of all verification records, keyed by normalized reference.
    #[must_use]
    pub fn records(&self) -> HashMap<String, VerificationRecord> {
        self.records.lock().expect("verifier state poisoned").clone()
    }

    /// Look up the record for one reference.
    #[must_use]
    pub fn record(&self, reference: &str) -> Option<VerificationRecord> {
        self.records
            .lock()
            .expect("verifier state poisoned")
            .get(&normalize_reference(reference))
            .cloned()
    }

    /// Drop all verification records and active markers (session end).
    pub fn clear(&self) {
        self.records.lock().expect("verifier state poisoned").clear();
        self.active.lock().expect("verifier state poisoned").clear();
    }

    /// Start a bounded polling loop confirming `reference` for `journey`.
    ///
    /// Returns `None` without issuing any request when the reference is not
    /// ledger-style, the journey id is empty, the record is already terminal,
    /// or a loop for this reference is already active. Otherwise the loop is
    /// spawned and its handle returned.
    pub fn verify(
        &self,
        reference: &str,
        journey: &JourneyId,
        user: &ChainAddress,
    ) -> Option<JoinHandle<()>> {
        let normalized = normalize_reference(reference);
        if !is_tx_reference(&normalized) || journey.as_str().is_empty() {
            return None;
        }
        if self
            .record(&normalized)
            .is_some_and(|r| r.status.is_terminal())
        {
            return None;
        }
        if !self
            .active
            .lock()
            .expect("verifier state poisoned")
            .insert(normalized.clone())
        {
            return None;
        }

        self.update(&normalized, VerificationStatus::Verifying, None, None);
        let verifier = self.clone();
        let journey = journey.clone();
        let user = user.clone();
        Some(tokio::spawn(async move {
            verifier.run(normalized, journey, user).await;
        }))
    }

    /// Level-triggered reconciliation: start verification for every receipt
    /// with a ledger-style reference, a known journey, and no terminal or
    /// active record. Safe to invoke redundantly; a no-op while
    /// unauthenticated.
    pub fn reconcile(&self, user: Option<&ChainAddress>, receipts: &[Receipt]) -> Vec<JoinHandle<()>> {
        let Some(user) = user else {
            return Vec::new();
        };
        let mut handles = Vec::new();
        for receipt in receipts {
            let normalized = normalize_reference(&receipt.reference);
            if !is_tx_reference(&normalized) {
                continue;
            }
            let journey = self
                .journeys
                .lock()
                .expect("verifier state poisoned")
                .get(&normalized)
                .cloned()
                .or_else(|| receipt.kind.default_journey());
            let Some(journey) = journey else { continue };
            if let Some(handle) = self.verify(&normalized, &journey, user) {
                handles.push(handle);
            }
        }
        handles
    }

    async fn run(self, reference: String, journey: JourneyId, user: ChainAddress) {
        for attempt in 1..=self.max_attempts {
            let last = attempt == self.max_attempts;
            match self.query(&reference, &journey, &user).await {
                Ok(response) if response.verified => {
                    self.update(
                        &reference,
                        VerificationStatus::Verified,
                        response.explorer_url,
                        None,
                    );
                    break;
                }
                Ok(response) => {
                    if last {
                        self.update(
                            &reference,
                            VerificationStatus::Failed,
                            response.explorer_url,
                            Some(format!(
                                "not confirmed after {} attempts",
                                self.max_attempts
                            )),
                        );
                    } else {
                        self.update(
                            &reference,
                            VerificationStatus::Pending,
                            response.explorer_url,
                            None,
                        );
                        (self.delay)(self.poll_interval).await;
                    }
                }
                Err(error) => {
                    tracing::warn!(%reference, %error, "verification request failed");
                    if last {
                        self.update(
                            &reference,
                            VerificationStatus::Failed,
                            None,
                            Some(error.to_string()),
                        );
                    } else {
                        (self.delay)(self.poll_interval).await;
                    }
                }
            }
        }
        self.active
            .lock()
            .expect("verifier state poisoned")
            .remove(&reference);
    }

    async fn query(
        &self,
        reference: &str,
        journey: &JourneyId,
        user: &ChainAddress,
    ) -> Result<VerifyResponse, Error> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("GIVING_API_BASE cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["api", "verify", reference]);
        url.query_pairs_mut()
            .append_pair("user", user.as_str())
            .append_pair("journey_id", journey.as_str());

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Endpoint {
                operation: "verification query",
                status: Some(status),
                detail,
            });
        }
        response.json::<VerifyResponse>().await.map_err(Into::into)
    }

    /// Single mutation point for the record map. An absent explorer URL never
    /// erases a previously learned one.
    fn update(
        &self,
        reference: &str,
        status: VerificationStatus,
        explorer_url: Option<String>,
        message: Option<String>,
    ) {
        let mut records = self.records.lock().expect("verifier state poisoned");
        let record = records
            .entry(reference.to_owned())
            .or_insert(VerificationRecord {
                status,
                explorer_url: None,
                message: None,
            });
        record.status = status;
        if explorer_url.is_some() {
            record.explorer_url = explorer_url;
        }
        record.message = message;
    }
}

impl CacheInvalidator for ReceiptVerifier {
    fn clear(&self) {
        Self::clear(self);
    }
}
