use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Normalized on-chain account address (`0x` prefix, lowercase hex).
///
/// Guaranteed well-formed by construction: holding a `ChainAddress` proves the
/// value is a ledger-style hex identifier. Parsing trims whitespace, lowercases,
/// and adds the `0x` prefix if it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainAddress(String);

impl ChainAddress {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ChainAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for ChainAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let trimmed = s.trim().to_ascii_lowercase();
        let digits = trimmed.strip_prefix("0x").unwrap_or(&trimmed);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(format!("0x{digits}")))
        } else {
            Err(Error::InvalidAddress(s))
        }
    }
}

impl From<ChainAddress> for String {
    fn from(a: ChainAddress) -> Self {
        a.0
    }
}

/// Logical operation identifier for a guided journey (opaque string).
///
/// Bound to a transaction reference when verification is requested, and echoed
/// back to the verification endpoint as `journey_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct JourneyId(pub String);

impl JourneyId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_address() {
        assert!("0xabc123".parse::<ChainAddress>().is_ok());
        assert!("0xDEADBEEF".parse::<ChainAddress>().is_ok());
        assert!("abc123".parse::<ChainAddress>().is_ok());
    }

    #[test]
    fn address_is_normalized() {
        let addr: ChainAddress = "  0xDeadBeef ".parse().unwrap();
        assert_eq!(addr.as_str(), "0xdeadbeef");

        let bare: ChainAddress = "AbC".parse().unwrap();
        assert_eq!(bare.as_str(), "0xabc");
    }

    #[test]
    fn invalid_address_rejected() {
        assert!("".parse::<ChainAddress>().is_err());
        assert!("0x".parse::<ChainAddress>().is_err());
        assert!("MOCK-TX-001".parse::<ChainAddress>().is_err());
        assert!("0xghij".parse::<ChainAddress>().is_err());
    }

    #[test]
    fn address_serde_roundtrip() {
        let addr: ChainAddress = "0xabc123".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xabc123\"");
        let parsed: ChainAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn journey_id_roundtrip() {
        let id = JourneyId::new("lend-and-donate@v1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"lend-and-donate@v1\"");
        let parsed: JourneyId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_address(_: &ChainAddress) {}
        fn takes_journey(_: &JourneyId) {}

        let addr: ChainAddress = "0xabc".parse().unwrap();
        let journey = JourneyId::new("journey@v1");

        takes_address(&addr);
        takes_journey(&journey);
        // takes_address(&journey);  // Compile error!
        // takes_journey(&addr);     // Compile error!
    }
}
