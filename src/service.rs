use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{HttpKeySource, KeyCache, KeySource};
use crate::claims::{CompactToken, Principal};
use crate::config::ValidatorConfig;
use crate::error::VerifyError;
use crate::http::Deadline;
use crate::opaque::{HttpIntrospector, Introspector, OpaqueValidator};
use crate::structured::StructuredValidator;

pub const DEVELOPMENT_SUBJECT: &str = "dev-user-123";

/// Entry point for inbound credentials. Construct once and share across
/// request handlers; all methods take `&self`.
#[derive(Debug)]
pub struct TokenValidationService {
    config: ValidatorConfig,
    structured: StructuredValidator,
    opaque: OpaqueValidator,
}

impl TokenValidationService {
    /// Production wiring: both key endpoints and the introspection endpoint
    /// over HTTPS, sharing one connection pool.
    pub fn new(config: ValidatorConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.http_timeout()).build();
        let platform = Arc::new(HttpKeySource::with_agent(agent.clone(), &config.platform_keys_url));
        let federated = Arc::new(HttpKeySource::with_agent(agent.clone(), &config.federated_keys_url));
        let introspector = Box::new(HttpIntrospector::with_agent(agent, &config.introspection_url));
        Self::with_sources(config, platform, federated, introspector)
    }

    pub fn with_sources(
        config: ValidatorConfig,
        platform: Arc<dyn KeySource>,
        federated: Arc<dyn KeySource>,
        introspector: Box<dyn Introspector>,
    ) -> Self {
        Self::with_caches(
            config,
            KeyCache::new("platform", platform),
            KeyCache::new("federated", federated),
            introspector,
        )
    }

    pub fn with_caches(
        config: ValidatorConfig,
        platform: KeyCache,
        federated: KeyCache,
        introspector: Box<dyn Introspector>,
    ) -> Self {
        if config.development_mode {
            warn!(email = %config.development_email, "development mode enabled: credentials are not checked");
        }
        let structured = StructuredValidator::new(&config, platform, federated);
        let opaque = OpaqueValidator::new(&config, introspector);
        Self { config, structured, opaque }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn structured(&self) -> &StructuredValidator {
        &self.structured
    }

    /// Validates with the configured network timeout as deadline.
    pub fn validate(&self, credential: &str) -> Result<Principal, VerifyError> {
        self.validate_with_deadline(credential, Deadline::after(self.config.http_timeout()))
    }

    pub fn validate_with_deadline(&self, credential: &str, deadline: Deadline) -> Result<Principal, VerifyError> {
        if self.config.development_mode {
            return Ok(Principal::new(self.config.development_email.clone(), DEVELOPMENT_SUBJECT));
        }
        if credential.is_empty() {
            return Err(VerifyError::EmptyCredential);
        }
        match CompactToken::split(credential) {
            Some(parts) => {
                debug!("structured credential");
                self.structured.verify(&parts, deadline)
            }
            None => {
                debug!("opaque credential");
                self.opaque.validate(credential, deadline)
            }
        }
    }
}
