use thiserror::Error;

/// Failure of a credential validation. Every variant is terminal for the
/// call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("empty credential")]
    EmptyCredential,
    #[error("malformed token header: {0}")]
    MalformedHeader(String),
    #[error("malformed token payload: {0}")]
    MalformedPayload(String),
    #[error("alg not allowed: {0} (expected ES256 or RS256)")]
    UnsupportedAlgorithm(String),
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),
    #[error("audience mismatch: expected {expected}, got {actual}")]
    InvalidAudience { expected: String, actual: String },
    #[error("claim 'exp' expired: exp={expires_at} now={now}")]
    Expired { expires_at: i64, now: i64 },
    #[error("claim 'iat' in future: iat={issued_at} now={now}")]
    IssuedInFuture { issued_at: i64, now: i64 },
    #[error("no matching key for kid {0}")]
    KeyNotFound(String),
    #[error("key fetch failed: {0}")]
    KeyFetchFailed(String),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
    #[error("invalid signature")]
    SignatureInvalid,
    #[error("invalid access token: {0}")]
    InvalidAccessToken(String),
    #[error("access token has no email claim")]
    NoEmailClaim,
}

impl VerifyError {
    /// True when the failure came from an unreachable collaborator rather
    /// than from the credential itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::KeyFetchFailed(_))
    }
}

/// Failure talking to a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("deadline exceeded before request to {0}")]
    DeadlineExceeded(String),
    #[error("http status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session secret too short (min {min} bytes)")]
    WeakSecret { min: usize },
    #[error("bad session token format")]
    BadFormat,
    #[error("session token alg not allowed: {0}")]
    Alg(String),
    #[error("invalid session token signature")]
    Signature,
    #[error("session token expired")]
    Expired,
    #[error("session claims encoding failed: {0}")]
    Encode(String),
}
