#![forbid(unsafe_code)]
//! Bearer credential validation for services behind an identity-aware proxy.
//!
//! A credential is one of:
//! - a platform assertion (ES256, `iss = https://cloud.google.com/iap`),
//! - a federated ID token (RS256, Google accounts issuer),
//! - an opaque access token, checked against the introspection endpoint.
//!
//! [`TokenValidationService`] picks the path by token shape and returns a
//! [`Principal`]. Signing keys come from two independent JWKS caches that
//! refresh on miss or expiry and keep serving stale keys through endpoint
//! outages. [`SessionTokens`] mints the application's own HS256 session
//! credential from a verified principal.

/// Re-export json_atomic for canonical JSON serialization of session claims.
pub use json_atomic;

pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod http;
pub mod issuer;
pub mod keys;
pub mod opaque;
pub mod service;
pub mod session;
pub mod structured;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{HttpKeySource, KeyCache, KeyCacheState, KeySource, StaticKeySource};
pub use claims::{Principal, RawTokenClaims, RawTokenHeader};
pub use config::ValidatorConfig;
pub use error::{ConfigError, FetchError, SessionError, VerifyError};
pub use http::Deadline;
pub use issuer::{classify_issuer, IssuerKind};
pub use keys::{Algorithm, KeyEntry, KeyRecord, KeySet, PublicKey};
pub use opaque::{HttpIntrospector, Introspector, OpaqueValidator, TokenInfo};
pub use service::TokenValidationService;
pub use session::{SessionClaims, SessionIdentity, SessionTokens};
pub use structured::StructuredValidator;

/// Current time as unix seconds.
pub fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
