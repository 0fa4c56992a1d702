//! Validator configuration, fixed at construction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DEVELOPMENT_EMAIL: &str = "developer@localhost";
pub const DEFAULT_PLATFORM_KEYS_URL: &str = "https://www.gstatic.com/iap/verify/public_key-jwk";
pub const DEFAULT_FEDERATED_KEYS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const DEFAULT_INTROSPECTION_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Audience required on platform assertions. Empty accepts any.
    pub expected_audience: String,
    /// Client IDs accepted on federated ID tokens and access tokens. Empty accepts any.
    pub expected_client_ids: Vec<String>,
    pub development_mode: bool,
    pub development_email: String,
    pub platform_keys_url: String,
    pub federated_keys_url: String,
    pub introspection_url: String,
    pub http_timeout_secs: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            expected_audience: String::new(),
            expected_client_ids: Vec::new(),
            development_mode: false,
            development_email: DEFAULT_DEVELOPMENT_EMAIL.to_string(),
            platform_keys_url: DEFAULT_PLATFORM_KEYS_URL.to_string(),
            federated_keys_url: DEFAULT_FEDERATED_KEYS_URL.to_string(),
            introspection_url: DEFAULT_INTROSPECTION_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl ValidatorConfig {
    pub fn with_audience(mut self, aud: &str) -> Self { self.expected_audience = aud.to_string(); self }
    pub fn with_client_ids(mut self, ids: &str) -> Self { self.expected_client_ids = parse_client_ids(ids); self }
    pub fn with_development_mode(mut self, email: &str) -> Self {
        self.development_mode = true;
        self.development_email = email.to_string();
        self
    }
    pub fn with_platform_keys_url(mut self, url: &str) -> Self { self.platform_keys_url = url.to_string(); self }
    pub fn with_federated_keys_url(mut self, url: &str) -> Self { self.federated_keys_url = url.to_string(); self }
    pub fn with_introspection_url(mut self, url: &str) -> Self { self.introspection_url = url.to_string(); self }
    pub fn with_http_timeout(mut self, secs: u64) -> Self { self.http_timeout_secs = secs; self }

    /// Network timeout, clamped to `1..=MAX_HTTP_TIMEOUT_SECS` seconds.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.clamp(1, MAX_HTTP_TIMEOUT_SECS))
    }

    /// Reads the `AUTH_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("AUTH_EXPECTED_AUDIENCE") {
            cfg.expected_audience = v.trim().to_string();
        }
        if let Some(v) = lookup("AUTH_EXPECTED_CLIENT_IDS") {
            cfg.expected_client_ids = parse_client_ids(&v);
        }
        if let Some(v) = lookup("AUTH_DEVELOPMENT_MODE") {
            cfg.development_mode = parse_bool("AUTH_DEVELOPMENT_MODE", &v)?;
        }
        if let Some(v) = lookup("AUTH_DEVELOPMENT_EMAIL") {
            if !v.trim().is_empty() {
                cfg.development_email = v.trim().to_string();
            }
        }
        if let Some(v) = lookup("AUTH_PLATFORM_KEYS_URL") {
            cfg.platform_keys_url = v;
        }
        if let Some(v) = lookup("AUTH_FEDERATED_KEYS_URL") {
            cfg.federated_keys_url = v;
        }
        if let Some(v) = lookup("AUTH_INTROSPECTION_URL") {
            cfg.introspection_url = v;
        }
        if let Some(v) = lookup("AUTH_HTTP_TIMEOUT_SECS") {
            cfg.http_timeout_secs = v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_HTTP_TIMEOUT_SECS).contains(secs))
                .ok_or_else(|| ConfigError::InvalidValue { key: "AUTH_HTTP_TIMEOUT_SECS", value: v.clone() })?;
        }
        Ok(cfg)
    }
}

/// Comma-separated list into an ordered, duplicate-free set.
fn parse_client_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|x| x == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value: raw.to_string() }),
    }
}
