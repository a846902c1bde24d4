use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identity claims decoded from a provider ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Decodes the payload of a compact-form ID token into [`Identity`].
///
/// The signature is NOT verified here — the account-derivation service
/// validates the token; this only extracts display claims. Tokens are
/// consumed immediately and never persisted.
///
/// # Errors
///
/// Returns [`Error::Token`] if the payload segment is missing, not valid
/// base64url, not JSON, or lacks a `sub` claim.
pub fn decode_id_token(token: &str) -> Result<Identity, Error> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| Error::Token("missing payload".into()))?;

    // Providers emit unpadded base64url; tolerate padded input too.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    let claims: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Token(format!("invalid payload: {e}")))?;

    let sub = claims
        .sub
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| Error::Token("missing claim: sub".into()))?;

    Ok(Identity {
        sub,
        name: claims.name,
        email: claims.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn decodes_full_claims() {
        let token = make_token(&serde_json::json!({
            "sub": "user-123",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
        }));
        let identity = decode_id_token(&token).unwrap();
        assert_eq!(identity.sub, "user-123");
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn name_and_email_are_optional() {
        let token = make_token(&serde_json::json!({ "sub": "user-123" }));
        let identity = decode_id_token(&token).unwrap();
        assert_eq!(identity.sub, "user-123");
        assert!(identity.name.is_none());
        assert!(identity.email.is_none());
    }

    #[test]
    fn accepts_padded_payload() {
        use base64::engine::general_purpose::URL_SAFE;

        let payload = URL_SAFE.encode(br#"{"sub":"user-123"}"#);
        let token = format!("header.{payload}.signature");
        assert_eq!(decode_id_token(&token).unwrap().sub, "user-123");
    }

    #[test]
    fn rejects_missing_payload() {
        assert!(decode_id_token("justonechunk").is_err());
        assert!(decode_id_token("header..signature").is_err());
        assert!(decode_id_token("").is_err());
    }

    #[test]
    fn rejects_bad_encoding() {
        assert!(decode_id_token("header.!!!.signature").is_err());
    }

    #[test]
    fn rejects_missing_sub() {
        let token = make_token(&serde_json::json!({ "name": "No Subject" }));
        assert!(matches!(decode_id_token(&token), Err(Error::Token(_))));
    }
}
