use std::sync::Arc;

use crate::models::PolicyDecision;
use crate::utils::split_email;

/// Decides whether an email may be used for a guest identity.
///
/// Domains claimed by an organization, and any subdomain of them, are
/// reserved for that organization's staff accounts.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    claimed: Arc<Vec<String>>,
}

impl DomainPolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut claimed: Vec<String> = domains
            .into_iter()
            .filter_map(|d| normalize_domain(d.as_ref()))
            .collect();
        claimed.sort();
        claimed.dedup();

        Self {
            claimed: Arc::new(claimed),
        }
    }

    pub fn claimed_domains(&self) -> &[String] {
        &self.claimed
    }

    pub fn evaluate(&self, email: &str) -> PolicyDecision {
        let Some((_, domain)) = split_email(email) else {
            return PolicyDecision::invalid_email();
        };
        let domain = domain.to_lowercase();

        match self.claimed.iter().find(|claimed| matches_domain(&domain, claimed)) {
            Some(claimed) => PolicyDecision::blocked(claimed),
            None => PolicyDecision::allow(),
        }
    }
}

fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw
        .trim()
        .trim_start_matches('@')
        .trim_start_matches('.')
        .to_lowercase();
    (!domain.is_empty()).then_some(domain)
}

/// Exact match or `*.claimed`.
fn matches_domain(domain: &str, claimed: &str) -> bool {
    domain == claimed
        || domain
            .strip_suffix(claimed)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PolicyRejection;

    fn policy() -> DomainPolicy {
        DomainPolicy::new(["acme.com", " @Newsroom.ORG ", ""])
    }

    #[test]
    fn test_exact_and_subdomain_blocked() {
        let policy = policy();

        let decision = policy.evaluate("user@acme.com");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(PolicyRejection::DomainBlocked));
        assert_eq!(decision.blocked_domain.as_deref(), Some("acme.com"));

        let decision = policy.evaluate("user@sub.acme.com");
        assert!(!decision.allowed);
        assert_eq!(decision.blocked_domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn test_case_insensitive() {
        let policy = policy();
        assert!(!policy.evaluate("Editor@NEWSROOM.org").allowed);
        assert!(!policy.evaluate("x@Desk.Newsroom.Org").allowed);
    }

    #[test]
    fn test_unclaimed_allowed() {
        let policy = policy();
        assert_eq!(policy.evaluate("user@gmail.com"), PolicyDecision::allow());
        // suffix without a dot boundary is a different domain
        assert!(policy.evaluate("user@notacme.com").allowed);
        assert!(policy.evaluate("user@acme.com.evil.io").allowed);
    }

    #[test]
    fn test_invalid_email() {
        let policy = policy();
        for email in ["", "no-at", "@acme.com", "user@", "   "] {
            let decision = policy.evaluate(email);
            assert!(!decision.allowed, "{email}");
            assert_eq!(decision.reason, Some(PolicyRejection::InvalidEmail));
        }
    }

    #[test]
    fn test_domains_normalized() {
        assert_eq!(
            policy().claimed_domains(),
            &["acme.com".to_string(), "newsroom.org".to_string()]
        );
        assert!(DomainPolicy::default().evaluate("a@acme.com").allowed);
    }
}
