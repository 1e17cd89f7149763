use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::config::VerificationConfig;
use crate::error::{AppError, AppResult};
use crate::external::CodeSender;
use crate::models::*;
use crate::services::{
    CodeStore, DomainPolicy, FixedWindowRateLimiter, InMemoryCodeStore, InMemoryRateLimitStore,
    RateLimitStore,
};
use crate::utils::{generate_numeric_code, normalize_subject};

#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub code_length: u32,
    pub code_ttl: Duration,
    pub max_attempts: u32,
    pub echo_code: bool,
}

impl VerificationSettings {
    pub fn from_config(config: &VerificationConfig, production: bool) -> Self {
        Self {
            code_length: config.code_length,
            code_ttl: Duration::seconds(config.code_ttl_seconds),
            max_attempts: config.max_attempts,
            echo_code: config.echoes_code(production),
        }
    }
}

/// Issues and verifies one-time guest email codes.
#[derive(Clone)]
pub struct VerificationService {
    policy: DomainPolicy,
    rate_limiter: FixedWindowRateLimiter,
    codes: Arc<Mutex<Box<dyn CodeStore>>>,
    sender: Arc<dyn CodeSender>,
    settings: VerificationSettings,
}

impl VerificationService {
    pub fn new(
        config: &VerificationConfig,
        production: bool,
        sender: Arc<dyn CodeSender>,
    ) -> Self {
        Self::with_stores(
            config,
            production,
            sender,
            Box::new(InMemoryCodeStore::new()),
            Box::new(InMemoryRateLimitStore::new()),
        )
    }

    pub fn with_stores(
        config: &VerificationConfig,
        production: bool,
        sender: Arc<dyn CodeSender>,
        code_store: Box<dyn CodeStore>,
        rate_limit_store: Box<dyn RateLimitStore>,
    ) -> Self {
        Self {
            policy: DomainPolicy::new(&config.claimed_domains),
            rate_limiter: FixedWindowRateLimiter::new(
                rate_limit_store,
                Duration::seconds(config.rate_limit_window_seconds),
                config.rate_limit_max_requests,
            ),
            codes: Arc::new(Mutex::new(code_store)),
            sender,
            settings: VerificationSettings::from_config(config, production),
        }
    }

    pub fn policy(&self) -> &DomainPolicy {
        &self.policy
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.settings.code_ttl.num_seconds()
    }

    pub async fn issue(&self, subject: &str, client_key: &str) -> AppResult<IssuedCode> {
        self.issue_at(subject, client_key, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        subject: &str,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedCode> {
        if let RateLimitDecision::Limited {
            retry_after_seconds,
        } = self.rate_limiter.check_at(client_key, now).await
        {
            return Err(AppError::RateLimited {
                retry_after_seconds,
            });
        }

        let subject = normalize_subject(subject);
        let decision = self.policy.evaluate(&subject);
        if let Some(reason) = decision.reason {
            return Err(AppError::from_policy(reason, decision.blocked_domain));
        }

        let code = generate_numeric_code(self.settings.code_length);
        {
            let mut codes = self.codes.lock().await;
            let pruned = codes.prune_expired(now);
            if pruned > 0 {
                log::debug!("Pruned {pruned} expired verification codes");
            }
            codes.set(CodeEntry::new(
                subject.clone(),
                code.clone(),
                now + self.settings.code_ttl,
            ));
        }

        let ttl_seconds = self.ttl_seconds();
        if let Err(e) = self
            .sender
            .send_verification_code(&subject, &code, ttl_seconds)
        {
            let mut codes = self.codes.lock().await;
            // a concurrent re-issue may already have replaced our entry
            if codes.get(&subject).is_some_and(|entry| entry.code == code) {
                codes.delete(&subject);
            }
            return Err(e);
        }

        Ok(IssuedCode {
            ttl_seconds,
            dev_code: self.settings.echo_code.then_some(code),
        })
    }

    /// Checks `supplied_code` for `subject`. Returns the normalized subject.
    pub async fn verify(&self, subject: &str, supplied_code: &str) -> Result<String, VerifyFailure> {
        self.verify_at(subject, supplied_code, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        subject: &str,
        supplied_code: &str,
        now: DateTime<Utc>,
    ) -> Result<String, VerifyFailure> {
        let subject = normalize_subject(subject);
        let mut codes = self.codes.lock().await;

        let Some(mut entry) = codes.get(&subject) else {
            return Err(VerifyFailure::NotFound);
        };

        if entry.is_expired(now) {
            codes.delete(&subject);
            return Err(VerifyFailure::Expired);
        }

        if entry.attempts >= self.settings.max_attempts {
            codes.delete(&subject);
            log::warn!("Verification attempts exhausted for {subject}");
            return Err(VerifyFailure::TooManyAttempts);
        }

        entry.attempts += 1;

        if supplied_code.trim() == entry.code {
            codes.delete(&subject);
            log::info!("Verification succeeded for {subject}");
            Ok(subject)
        } else {
            codes.set(entry);
            Err(VerifyFailure::Mismatch)
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending(&self, subject: &str) -> Option<CodeEntry> {
        self.codes.lock().await.get(&normalize_subject(subject))
    }
}
