//! Issuer classification of decoded, not yet verified claims.

pub const PLATFORM_ISSUER: &str = "https://cloud.google.com/iap";
pub const FEDERATED_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Which family a structured token belongs to. Each family has its own key
/// namespace and audience semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuerKind {
    PlatformAssertion,
    FederatedIdToken,
}

impl IssuerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuerKind::PlatformAssertion => "platform",
            IssuerKind::FederatedIdToken => "federated",
        }
    }
}

/// Exact-match classification of an `iss` claim.
pub fn classify_issuer(iss: &str) -> Option<IssuerKind> {
    if iss == PLATFORM_ISSUER {
        Some(IssuerKind::PlatformAssertion)
    } else if FEDERATED_ISSUERS.contains(&iss) {
        Some(IssuerKind::FederatedIdToken)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_strings_match_exactly() {
        assert_eq!(classify_issuer(PLATFORM_ISSUER), Some(IssuerKind::PlatformAssertion));
        assert_eq!(classify_issuer("https://accounts.google.com"), Some(IssuerKind::FederatedIdToken));
        assert_eq!(classify_issuer("accounts.google.com"), Some(IssuerKind::FederatedIdToken));
        assert_eq!(classify_issuer("https://accounts.google.com/"), None);
        assert_eq!(classify_issuer("https://cloud.google.com/iap/"), None);
        assert_eq!(classify_issuer(""), None);
    }
}
