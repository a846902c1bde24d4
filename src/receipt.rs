use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::JourneyId;

/// Journey covering the guided lend-and-donate flow; the default journey for
/// donation receipts that were never explicitly registered.
pub const LEND_AND_DONATE_JOURNEY: &str = "lend-and-donate@v1";

/// Kind of portfolio operation a receipt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    Purchase,
    Swap,
    Borrow,
    Donation,
}

impl ReceiptKind {
    /// Journey assumed for this kind when none was registered for the
    /// receipt's reference.
    #[must_use]
    pub fn default_journey(self) -> Option<JourneyId> {
        match self {
            Self::Donation => Some(JourneyId::new(LEND_AND_DONATE_JOURNEY)),
            _ => None,
        }
    }
}

/// Record of a completed operation, as served by the app API.
///
/// Immutable once created; verification status is tracked separately by the
/// [`ReceiptVerifier`](crate::verifier::ReceiptVerifier), keyed by normalized
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(rename = "type")]
    pub kind: ReceiptKind,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Transaction reference; may be a ledger hash or an internal mock value.
    pub reference: String,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_defaults_to_lend_and_donate() {
        assert_eq!(
            ReceiptKind::Donation.default_journey(),
            Some(JourneyId::new("lend-and-donate@v1"))
        );
    }

    #[test]
    fn other_kinds_have_no_default_journey() {
        assert!(ReceiptKind::Purchase.default_journey().is_none());
        assert!(ReceiptKind::Swap.default_journey().is_none());
        assert!(ReceiptKind::Borrow.default_journey().is_none());
    }

    #[test]
    fn wire_format_matches_app_api() {
        let json = r#"{
            "type": "Donation",
            "amount": 25.0,
            "cause": "clean-water",
            "reference": "0xabc123",
            "createdAt": "2024-05-01T12:00:00Z"
        }"#;
        let receipt: Receipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.kind, ReceiptKind::Donation);
        assert_eq!(receipt.amount, 25.0);
        assert_eq!(receipt.cause.as_deref(), Some("clean-water"));
        assert_eq!(receipt.reference, "0xabc123");
        assert!(receipt.created_at.is_some());
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let json = r#"{ "type": "Swap", "amount": 10.5, "reference": "MOCK-TX-001" }"#;
        let receipt: Receipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.kind, ReceiptKind::Swap);
        assert!(receipt.cause.is_none());
        assert!(receipt.created_at.is_none());
    }
}
