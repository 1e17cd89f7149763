use crate::error::AppResult;

/// Channel that gets a freshly issued code to the person being verified.
pub trait CodeSender: Send + Sync {
    fn send_verification_code(&self, subject: &str, code: &str, ttl_seconds: i64)
    -> AppResult<()>;
}

/// Stub channel: records the issuance in the log instead of emailing it.
#[derive(Debug, Clone, Default)]
pub struct LogCodeSender {
    reveal_code: bool,
}

impl LogCodeSender {
    /// `reveal_code` must only be set for non-production configurations.
    pub fn new(reveal_code: bool) -> Self {
        Self { reveal_code }
    }
}

impl CodeSender for LogCodeSender {
    fn send_verification_code(
        &self,
        subject: &str,
        code: &str,
        ttl_seconds: i64,
    ) -> AppResult<()> {
        if self.reveal_code {
            log::info!(
                "Verification code for {subject}: {code} (valid for {ttl_seconds}s, delivery stubbed)"
            );
        } else {
            log::info!("Verification code issued for {subject}, valid for {ttl_seconds}s");
        }
        Ok(())
    }
}
