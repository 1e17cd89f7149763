use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pending verification challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub subject: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl CodeEntry {
    pub fn new(subject: String, code: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            code,
            expires_at,
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Fixed-window request counter for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub count: u32,
    pub window_ends_at: DateTime<Utc>,
}

impl RateLimitBucket {
    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_ends_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after_seconds: u64 },
}

/// Why the policy gate refused an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRejection {
    InvalidEmail,
    DomainBlocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub reason: Option<PolicyRejection>,
    pub blocked_domain: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            blocked_domain: None,
        }
    }

    pub fn invalid_email() -> Self {
        Self {
            allowed: false,
            reason: Some(PolicyRejection::InvalidEmail),
            blocked_domain: None,
        }
    }

    pub fn blocked(domain: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(PolicyRejection::DomainBlocked),
            blocked_domain: Some(domain.to_string()),
        }
    }
}

/// Verification failures, all user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    NotFound,
    Expired,
    TooManyAttempts,
    Mismatch,
}

impl VerifyFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyFailure::NotFound => "not_found",
            VerifyFailure::Expired => "expired",
            VerifyFailure::TooManyAttempts => "too_many_attempts",
            VerifyFailure::Mismatch => "mismatch",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            VerifyFailure::NotFound => "No pending code for this address. Request a new code.",
            VerifyFailure::Expired => "This code has expired. Request a new code.",
            VerifyFailure::TooManyAttempts => "Too many attempts. Request a new code.",
            VerifyFailure::Mismatch => "Incorrect code.",
        }
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub ttl_seconds: i64,
    /// Only set when the configuration allows echoing.
    pub dev_code: Option<String>,
}
