//! Long-lived application session tokens (HS256 over a single shared secret).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64URL, Engine as _};
use hmac::{Hmac, Mac};
use json_atomic::canonize;
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

use crate::claims::{b64url_decode, CompactToken, Principal, RawTokenHeader};
use crate::error::SessionError;
use crate::now_ts;

type HmacSha256 = Hmac<Sha256>;

pub const MIN_SECRET_LEN: usize = 32;
pub const SESSION_TTL_SECS: i64 = 30 * 24 * 3600;
const HANDLE_LEN: usize = 16;

/// Identity carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub subject: String,
    pub email: String,
    pub role: String,
}

impl SessionIdentity {
    pub fn from_principal(principal: &Principal, role: &str) -> Self {
        Self { subject: principal.subject().to_string(), email: principal.email().to_string(), role: role.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    /// Random revocation handle.
    pub jti: String,
}

pub struct SessionTokens {
    keyed: HmacSha256,
    ttl_secs: i64,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens").field("ttl_secs", &self.ttl_secs).finish_non_exhaustive()
    }
}

impl SessionTokens {
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret { min: MIN_SECRET_LEN });
        }
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| SessionError::WeakSecret { min: MIN_SECRET_LEN })?;
        Ok(Self { keyed, ttl_secs: SESSION_TTL_SECS })
    }

    pub fn issue(&self, identity: &SessionIdentity) -> Result<String, SessionError> {
        self.issue_at(identity, now_ts())
    }

    pub(crate) fn issue_at(&self, identity: &SessionIdentity, now: i64) -> Result<String, SessionError> {
        let mut handle = [0u8; HANDLE_LEN];
        rand::thread_rng().fill(&mut handle);
        let claims = SessionClaims {
            sub: identity.subject.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            iat: now,
            exp: now + self.ttl_secs,
            jti: B64URL.encode(handle),
        };

        let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
        let claims = serde_json::to_value(&claims).map_err(|e| SessionError::Encode(e.to_string()))?;
        let hdr = B64URL.encode(canonize(&header).map_err(|_| SessionError::Encode("header".into()))?);
        let pld = B64URL.encode(canonize(&claims).map_err(|_| SessionError::Encode("claims".into()))?);
        let msg = format!("{hdr}.{pld}");
        let sig = B64URL.encode(self.mac(msg.as_bytes()).finalize().into_bytes());
        Ok(format!("{msg}.{sig}"))
    }

    /// Checks signature and expiry and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.verify_at(token, now_ts())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, SessionError> {
        let parts = CompactToken::split(token).ok_or(SessionError::BadFormat)?;
        let header = decode::<RawTokenHeader>(parts.header)?;
        if header.alg != "HS256" {
            return Err(SessionError::Alg(header.alg));
        }
        let sig = b64url_decode(parts.signature).map_err(|_| SessionError::BadFormat)?;
        self.mac(parts.signing_input().as_bytes())
            .verify_slice(&sig)
            .map_err(|_| SessionError::Signature)?;

        let claims = decode::<SessionClaims>(parts.payload)?;
        if claims.exp <= now {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, message: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(message);
        mac
    }
}

fn decode<T: DeserializeOwned>(segment: &str) -> Result<T, SessionError> {
    let bytes = b64url_decode(segment).map_err(|_| SessionError::BadFormat)?;
    serde_json::from_slice(&bytes).map_err(|_| SessionError::BadFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn identity() -> SessionIdentity {
        SessionIdentity::from_principal(&Principal::new("reporter@example.com", "accounts.google.com:1001"), "reporter")
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(SessionTokens::new(b"short"), Err(SessionError::WeakSecret { min: 32 })));
    }

    #[test]
    fn issued_token_verifies_with_embedded_claims() {
        let tokens = SessionTokens::new(SECRET).unwrap();
        let token = tokens.issue(&identity()).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "accounts.google.com:1001");
        assert_eq!(claims.email, "reporter@example.com");
        assert_eq!(claims.role, "reporter");
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
        assert_eq!(b64url_decode(&claims.jti).unwrap().len(), HANDLE_LEN);
    }

    #[test]
    fn revocation_handles_are_unique() {
        let tokens = SessionTokens::new(SECRET).unwrap();
        let a = tokens.verify(&tokens.issue(&identity()).unwrap()).unwrap();
        let b = tokens.verify(&tokens.issue(&identity()).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn other_secret_fails_signature() {
        let token = SessionTokens::new(SECRET).unwrap().issue(&identity()).unwrap();
        let other = SessionTokens::new(b"ffffffffffffffffffffffffffffffff").unwrap();
        assert_eq!(other.verify(&token), Err(SessionError::Signature));
    }

    #[test]
    fn expired_session_is_rejected() {
        let tokens = SessionTokens::new(SECRET).unwrap();
        let token = tokens.issue_at(&identity(), now_ts() - SESSION_TTL_SECS - 1).unwrap();
        assert_eq!(tokens.verify(&token), Err(SessionError::Expired));
        assert!(tokens.verify_at(&token, now_ts() - SESSION_TTL_SECS).is_ok());
    }

    #[test]
    fn foreign_algorithms_and_shapes_are_rejected() {
        let tokens = SessionTokens::new(SECRET).unwrap();
        let token = tokens.issue(&identity()).unwrap();
        let (_, rest) = token.split_once('.').unwrap();
        let none_hdr = B64URL.encode(br#"{"alg":"none"}"#);
        assert_eq!(tokens.verify(&format!("{none_hdr}.{rest}")), Err(SessionError::Alg("none".into())));
        assert_eq!(tokens.verify("not-a-token"), Err(SessionError::BadFormat));
        assert_eq!(tokens.verify(&format!("{token}.extra")), Err(SessionError::BadFormat));
    }
}
