//! Bare access tokens, validated by asking the issuer.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::claims::Principal;
use crate::config::ValidatorConfig;
use crate::error::{FetchError, VerifyError};
use crate::http::{get_json, Deadline};

/// Introspection response. Every field is optional on the wire; the
/// numeric ones arrive as either JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "int_or_string")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "int_or_string")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub access_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

fn int_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<IntOrString>::deserialize(d)? {
        None => Ok(None),
        Some(IntOrString::Int(v)) => Ok(Some(v)),
        Some(IntOrString::Str(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

fn bool_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    match Option::<BoolOrString>::deserialize(d)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::Str(s)) => match s.as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("not a bool: {other}"))),
        },
    }
}

pub trait Introspector: Send + Sync {
    fn introspect(&self, token: &str, deadline: Deadline) -> Result<TokenInfo, FetchError>;
}

/// GET `<url>?access_token=<token>`.
#[derive(Debug, Clone)]
pub struct HttpIntrospector {
    agent: ureq::Agent,
    url: String,
}

impl HttpIntrospector {
    pub fn new(url: &str) -> Self {
        Self::with_agent(ureq::AgentBuilder::new().build(), url)
    }

    pub fn with_agent(agent: ureq::Agent, url: &str) -> Self {
        Self { agent, url: url.to_string() }
    }
}

impl Introspector for HttpIntrospector {
    fn introspect(&self, token: &str, deadline: Deadline) -> Result<TokenInfo, FetchError> {
        get_json(&self.agent, &self.url, &[("access_token", token)], deadline)
    }
}

pub struct OpaqueValidator {
    introspector: Box<dyn Introspector>,
    client_ids: Vec<String>,
}

impl std::fmt::Debug for OpaqueValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueValidator").field("client_ids", &self.client_ids).finish_non_exhaustive()
    }
}

impl OpaqueValidator {
    pub fn new(config: &ValidatorConfig, introspector: Box<dyn Introspector>) -> Self {
        Self { introspector, client_ids: config.expected_client_ids.clone() }
    }

    /// One introspection call per invocation; results are not cached.
    pub fn validate(&self, token: &str, deadline: Deadline) -> Result<Principal, VerifyError> {
        let info = self
            .introspector
            .introspect(token, deadline)
            .map_err(|e| VerifyError::InvalidAccessToken(e.to_string()))?;

        if !self.client_ids.is_empty() {
            let matches = |claim: &Option<String>| {
                claim.as_deref().is_some_and(|v| self.client_ids.iter().any(|id| id == v))
            };
            if !matches(&info.azp) && !matches(&info.aud) {
                return Err(VerifyError::InvalidAudience {
                    expected: self.client_ids.join(","),
                    actual: info.azp.or(info.aud).unwrap_or_default(),
                });
            }
        }

        if matches!(info.expires_in, Some(secs) if secs <= 0) {
            return Err(VerifyError::InvalidAccessToken("token has expired".into()));
        }

        let email = info.email.filter(|e| !e.is_empty()).ok_or(VerifyError::NoEmailClaim)?;
        let sub = info
            .sub
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VerifyError::InvalidAccessToken("missing subject".into()))?;
        debug!(scope = info.scope.as_deref().unwrap_or_default(), "access token accepted");
        Ok(Principal::new(email, sub))
    }
}
