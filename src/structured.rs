use tracing::debug;

use crate::cache::KeyCache;
use crate::claims::{CompactToken, Principal, RawTokenClaims};
use crate::config::ValidatorConfig;
use crate::error::VerifyError;
use crate::http::Deadline;
use crate::issuer::{classify_issuer, IssuerKind};
use crate::keys::Algorithm;
use crate::now_ts;

/// Tolerated forward drift of `iat`, in seconds.
pub const IAT_SKEW_SECS: i64 = 300;

/// Validates signed three-segment tokens from either issuer family.
/// Each family has its own key cache; a `kid` is only looked up in the
/// cache of the issuer that claims it.
#[derive(Debug)]
pub struct StructuredValidator {
    platform: KeyCache,
    federated: KeyCache,
    expected_audience: String,
    client_ids: Vec<String>,
}

impl StructuredValidator {
    pub fn new(config: &ValidatorConfig, platform: KeyCache, federated: KeyCache) -> Self {
        Self {
            platform,
            federated,
            expected_audience: config.expected_audience.clone(),
            client_ids: config.expected_client_ids.clone(),
        }
    }

    pub fn platform_keys(&self) -> &KeyCache {
        &self.platform
    }

    pub fn federated_keys(&self) -> &KeyCache {
        &self.federated
    }

    pub fn verify(&self, token: &CompactToken<'_>, deadline: Deadline) -> Result<Principal, VerifyError> {
        self.verify_at(token, now_ts(), deadline)
    }

    /// Format and claim checks run before any key fetch, so malformed
    /// input never reaches the network.
    pub fn verify_at(&self, token: &CompactToken<'_>, now: i64, deadline: Deadline) -> Result<Principal, VerifyError> {
        let header = token.decode_header()?;
        let alg = Algorithm::parse(&header.alg).ok_or_else(|| VerifyError::UnsupportedAlgorithm(header.alg.clone()))?;
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| VerifyError::MalformedHeader("missing kid".into()))?;

        let claims = token.decode_claims()?;
        let kind = classify_issuer(&claims.iss).ok_or_else(|| VerifyError::UnknownIssuer(claims.iss.clone()))?;
        self.check_audience(kind, &claims.aud)?;
        check_times(&claims, now)?;

        let cache = match kind {
            IssuerKind::PlatformAssertion => &self.platform,
            IssuerKind::FederatedIdToken => &self.federated,
        };
        debug!(issuer = kind.as_str(), kid = %kid, "claims accepted, resolving key");
        let key = cache.lookup(&kid, deadline)?;

        let signature = token.decode_signature()?;
        key.verify(alg, token.signing_input().as_bytes(), &signature)?;

        let RawTokenClaims { email, sub, .. } = claims;
        Ok(Principal::new(email, sub))
    }

    fn check_audience(&self, kind: IssuerKind, aud: &str) -> Result<(), VerifyError> {
        match kind {
            IssuerKind::PlatformAssertion => {
                if !self.expected_audience.is_empty() && aud != self.expected_audience {
                    return Err(VerifyError::InvalidAudience {
                        expected: self.expected_audience.clone(),
                        actual: aud.to_string(),
                    });
                }
            }
            IssuerKind::FederatedIdToken => {
                if !self.client_ids.is_empty() && !self.client_ids.iter().any(|id| id == aud) {
                    return Err(VerifyError::InvalidAudience {
                        expected: self.client_ids.join(","),
                        actual: aud.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_times(c: &RawTokenClaims, now: i64) -> Result<(), VerifyError> {
    if c.exp < now {
        return Err(VerifyError::Expired { expires_at: c.exp, now });
    }
    if c.iat > now + IAT_SKEW_SECS {
        return Err(VerifyError::IssuedInFuture { issued_at: c.iat, now });
    }
    Ok(())
}
