use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

// Upper bounds keep every `now + lifetime` far from chrono's range limit.
const MAX_CODE_TTL_SECONDS: i64 = 86_400;
const MAX_RATE_LIMIT_WINDOW_SECONDS: i64 = 86_400;
const MAX_TOKEN_LIFETIME_SECONDS: i64 = 30 * 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Production unless explicitly turned off.
    #[serde(default = "default_true")]
    pub production: bool,
    /// Empty list allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_expires_in")]
    pub access_token_expires_in: i64, // seconds
    #[serde(default = "default_verified_expires_in")]
    pub verified_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub claimed_domains: Vec<String>,
    #[serde(default = "default_code_length")]
    pub code_length: u32,
    #[serde(default = "default_code_ttl")]
    pub code_ttl_seconds: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: i64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_requests: u32,
    /// Echo the generated code in the send-code response. Ignored in production.
    #[serde(default)]
    pub expose_dev_code: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            claimed_domains: Vec::new(),
            code_length: default_code_length(),
            code_ttl_seconds: default_code_ttl(),
            max_attempts: default_max_attempts(),
            rate_limit_window_seconds: default_rate_limit_window(),
            rate_limit_max_requests: default_rate_limit_max(),
            expose_dev_code: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_access_expires_in() -> i64 {
    7200
}

fn default_verified_expires_in() -> i64 {
    900
}

fn default_code_length() -> u32 {
    6
}

fn default_code_ttl() -> i64 {
    600
}

fn default_max_attempts() -> u32 {
    6
}

fn default_rate_limit_window() -> i64 {
    300
}

fn default_rate_limit_max() -> u32 {
    5
}

/// Splits a comma separated list, dropping empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl VerificationConfig {
    /// Whether send-code responses may carry the generated code.
    pub fn echoes_code(&self, production: bool) -> bool {
        !production && self.expose_dev_code
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("failed to parse {config_path}: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No file: defaults, then the environment below fills in the rest
                Config {
                    server: ServerConfig {
                        host: "0.0.0.0".to_string(),
                        port: 8080,
                        production: true,
                        allowed_origins: Vec::new(),
                    },
                    jwt: JwtConfig {
                        secret: DEFAULT_JWT_SECRET.to_string(),
                        access_token_expires_in: default_access_expires_in(),
                        verified_token_expires_in: default_verified_expires_in(),
                    },
                    verification: VerificationConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("cannot read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> AppResult<()> {
        fn parsed<T: FromStr>(name: &str) -> AppResult<Option<T>> {
            parse_env_value(name, env::var(name).ok())
        }

        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = parsed("SERVER_PORT")? {
            self.server.port = p;
        }
        if let Some(b) = env_bool("APP_PRODUCTION", env::var("APP_PRODUCTION").ok())? {
            self.server.production = b;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.server.allowed_origins = parse_list(&v);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(n) = parsed("JWT_ACCESS_EXPIRES_IN")? {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(n) = parsed("JWT_VERIFIED_EXPIRES_IN")? {
            self.jwt.verified_token_expires_in = n;
        }

        let v = &mut self.verification;
        if let Ok(raw) = env::var("GUEST_CLAIMED_DOMAINS") {
            v.claimed_domains = parse_list(&raw);
        }
        if let Some(n) = parsed("GUEST_CODE_LENGTH")? {
            v.code_length = n;
        }
        if let Some(n) = parsed("GUEST_CODE_TTL_SECONDS")? {
            v.code_ttl_seconds = n;
        }
        if let Some(n) = parsed("GUEST_MAX_ATTEMPTS")? {
            v.max_attempts = n;
        }
        if let Some(n) = parsed("GUEST_RATE_LIMIT_WINDOW_SECONDS")? {
            v.rate_limit_window_seconds = n;
        }
        if let Some(n) = parsed("GUEST_RATE_LIMIT_MAX_REQUESTS")? {
            v.rate_limit_max_requests = n;
        }
        if let Some(b) = env_bool("GUEST_EXPOSE_DEV_CODE", env::var("GUEST_EXPOSE_DEV_CODE").ok())? {
            v.expose_dev_code = b;
        }
        Ok(())
    }

    /// Rejects configurations the service must not start with.
    pub fn validate(&self) -> AppResult<()> {
        let v = &self.verification;
        if !(4..=9).contains(&v.code_length) {
            return Err(AppError::ConfigError(
                "code_length must be between 4 and 9".into(),
            ));
        }
        if !(1..=MAX_CODE_TTL_SECONDS).contains(&v.code_ttl_seconds) {
            return Err(AppError::ConfigError(format!(
                "code_ttl_seconds must be between 1 and {MAX_CODE_TTL_SECONDS}"
            )));
        }
        if v.max_attempts == 0 {
            return Err(AppError::ConfigError("max_attempts must be positive".into()));
        }
        if !(1..=MAX_RATE_LIMIT_WINDOW_SECONDS).contains(&v.rate_limit_window_seconds) {
            return Err(AppError::ConfigError(format!(
                "rate_limit_window_seconds must be between 1 and {MAX_RATE_LIMIT_WINDOW_SECONDS}"
            )));
        }
        if v.rate_limit_max_requests == 0 {
            return Err(AppError::ConfigError(
                "rate_limit_max_requests must be positive".into(),
            ));
        }
        let lifetimes = [
            self.jwt.access_token_expires_in,
            self.jwt.verified_token_expires_in,
        ];
        if lifetimes
            .iter()
            .any(|n| !(1..=MAX_TOKEN_LIFETIME_SECONDS).contains(n))
        {
            return Err(AppError::ConfigError(format!(
                "token lifetimes must be between 1 and {MAX_TOKEN_LIFETIME_SECONDS} seconds"
            )));
        }
        if self.server.production
            && (self.jwt.secret.is_empty() || self.jwt.secret == DEFAULT_JWT_SECRET)
        {
            return Err(AppError::ConfigError(
                "JWT_SECRET must be set in production".into(),
            ));
        }
        Ok(())
    }
}

/// Parses an environment override. Unset means no override; set but
/// unparsable is a configuration error.
fn parse_env_value<T: FromStr>(name: &str, raw: Option<String>) -> AppResult<Option<T>> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::ConfigError(format!("{name} has an invalid value: {raw:?}"))),
    }
}

fn env_bool(name: &str, raw: Option<String>) -> AppResult<Option<bool>> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| AppError::ConfigError(format!("{name} must be a boolean, got {raw:?}"))),
    }
}
