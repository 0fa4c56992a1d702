use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::VerifyError;

/// JOSE header of a compact token. `kid` is checked after `alg` so that a
/// disallowed algorithm is reported as such even when no key id is present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Unverified claims. All fields are required; a missing or mistyped field
/// is a `MalformedPayload`, never a zero value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// A verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    email: String,
    subject: String,
}

impl Principal {
    pub fn new(email: impl Into<String>, subject: impl Into<String>) -> Self {
        Self { email: email.into(), subject: subject.into() }
    }
    pub fn email(&self) -> &str { &self.email }
    pub fn subject(&self) -> &str { &self.subject }
}

/// The three segments of a compact token, borrowed from the input.
#[derive(Debug, Clone, Copy)]
pub struct CompactToken<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> CompactToken<'a> {
    /// Splits on `.`; anything other than exactly three segments is `None`.
    pub fn split(token: &'a str) -> Option<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        Some(Self { header: parts[0], payload: parts[1], signature: parts[2] })
    }

    /// Bytes covered by the signature.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    pub fn decode_header(&self) -> Result<RawTokenHeader, VerifyError> {
        decode_segment(self.header).map_err(VerifyError::MalformedHeader)
    }

    pub fn decode_claims(&self) -> Result<RawTokenClaims, VerifyError> {
        decode_segment(self.payload).map_err(VerifyError::MalformedPayload)
    }

    pub fn decode_signature(&self) -> Result<Vec<u8>, VerifyError> {
        b64url_decode(self.signature).map_err(|_| VerifyError::SignatureInvalid)
    }
}

pub(crate) fn b64url_decode(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    B64URL.decode(segment.trim_end_matches('=').as_bytes())
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = b64url_decode(segment).map_err(|e| format!("base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("json: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use base64::Engine as _;

    fn seg(v: &serde_json::Value) -> String {
        B64URL.encode(serde_json::to_vec(v).unwrap())
    }

    #[test]
    fn split_requires_exactly_three_segments() {
        assert!(CompactToken::split("a.b.c").is_some());
        assert!(CompactToken::split("a.b").is_none());
        assert!(CompactToken::split("a.b.c.d").is_none());
        assert!(CompactToken::split("opaque-token").is_none());
        assert_eq!(CompactToken::split("a.b.c").unwrap().signing_input(), "a.b");
    }

    #[test]
    fn header_errors_are_malformed_header() {
        let t = CompactToken { header: "!!!", payload: "", signature: "" };
        assert!(matches!(t.decode_header(), Err(VerifyError::MalformedHeader(_))));

        let not_json = B64URL.encode(b"not json");
        let t = CompactToken { header: &not_json, payload: "", signature: "" };
        assert!(matches!(t.decode_header(), Err(VerifyError::MalformedHeader(_))));

        let h = seg(&json!({"alg":"RS256"}));
        let t = CompactToken { header: &h, payload: "", signature: "" };
        assert_eq!(t.decode_header().unwrap(), RawTokenHeader { alg: "RS256".into(), kid: None });
    }

    #[test]
    fn claims_reject_missing_and_mistyped_fields() {
        let missing_email = seg(&json!({"iss":"i","aud":"a","sub":"s","exp":1,"iat":1}));
        let t = CompactToken { header: "", payload: &missing_email, signature: "" };
        assert!(matches!(t.decode_claims(), Err(VerifyError::MalformedPayload(_))));

        let string_exp = seg(&json!({"iss":"i","aud":"a","sub":"s","email":"e","exp":"1","iat":1}));
        let t = CompactToken { header: "", payload: &string_exp, signature: "" };
        assert!(matches!(t.decode_claims(), Err(VerifyError::MalformedPayload(_))));
    }

    #[test]
    fn padded_segments_are_accepted() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(br#"{"alg":"ES256","kid":"k"}"#);
        let t = CompactToken { header: &padded, payload: "", signature: "" };
        assert_eq!(t.decode_header().unwrap().kid.as_deref(), Some("k"));
    }
}
