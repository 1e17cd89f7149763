use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::{ErrorResponse, PolicyRejection, VerifyFailure};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Email domain is claimed by an organization: {0}")]
    DomainBlocked(String),

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Verification failed: {}", .0.reason())]
    Verification(VerifyFailure),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Code delivery failed: {0}")]
    DeliveryError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn from_policy(rejection: PolicyRejection, blocked_domain: Option<String>) -> Self {
        match rejection {
            PolicyRejection::InvalidEmail => AppError::InvalidEmail,
            PolicyRejection::DomainBlocked => {
                AppError::DomainBlocked(blocked_domain.unwrap_or_default())
            }
        }
    }

    /// Stable reason code sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "invalid_input",
            AppError::InvalidEmail => "invalid_email",
            AppError::DomainBlocked(_) => "domain_blocked",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Verification(failure) => failure.reason(),
            AppError::AuthError(_) | AppError::JwtError(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::DeliveryError(_) => "delivery_failed",
            AppError::ConfigError(_) | AppError::InternalError(_) => "internal_error",
        }
    }
}

impl From<VerifyFailure> for AppError {
    fn from(failure: VerifyFailure) -> Self {
        AppError::Verification(failure)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidEmail => StatusCode::BAD_REQUEST,
            AppError::DomainBlocked(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Verification(VerifyFailure::TooManyAttempts) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Verification(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DeliveryError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let reason = self.reason();

        let message = match self {
            AppError::ValidationError(msg) | AppError::AuthError(msg) | AppError::NotFound(msg) => {
                log::warn!("{reason}: {msg}");
                msg.clone()
            }
            AppError::InvalidEmail => "Please enter a valid email address.".to_string(),
            AppError::DomainBlocked(domain) => {
                log::info!("Guest flow refused for claimed domain {domain}");
                "This email domain belongs to an organization. Sign in with your organization account instead.".to_string()
            }
            AppError::RateLimited { retry_after_seconds } => {
                log::warn!("Rate limited, retry after {retry_after_seconds}s");
                "Too many requests. Please wait before requesting another code.".to_string()
            }
            AppError::Verification(failure) => failure.message().to_string(),
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                "Invalid or expired token".to_string()
            }
            AppError::DeliveryError(msg) => {
                log::error!("Code delivery failed: {msg}");
                "Could not send the verification code".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        let mut body = ErrorResponse::new(reason, message);
        let mut builder = HttpResponse::build(status);
        if let AppError::RateLimited { retry_after_seconds } = self {
            body = body.with_retry_after(*retry_after_seconds);
            builder.insert_header(("Retry-After", retry_after_seconds.to_string()));
        }
        builder.json(body)
    }
}
