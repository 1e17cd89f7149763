use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const VERIFIED: &str = "verified";
const ACCESS: &str = "access";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email for "verified", guest id for "access"
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub token_type: String, // "verified" or "access"
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
    verified_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64, verified_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
            verified_token_expires_in: verified_expires_in,
        }
    }

    fn generate(&self, sub: String, token_type: &str, expires_in: i64) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in);

        let claims = Claims {
            sub,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    /// Proof that `email` just passed code verification.
    pub fn generate_verified_token(&self, email: &str) -> AppResult<String> {
        self.generate(email.to_string(), VERIFIED, self.verified_token_expires_in)
    }

    pub fn generate_access_token(&self, guest_id: Uuid) -> AppResult<String> {
        self.generate(guest_id.to_string(), ACCESS, self.access_token_expires_in)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    /// Returns the verified email.
    pub fn verify_verified_token(&self, token: &str) -> AppResult<String> {
        let claims = self.verify_token(token)?;

        if claims.token_type != VERIFIED {
            return Err(AppError::AuthError("Invalid verification token type".to_string()));
        }

        Ok(claims.sub)
    }

    /// Returns the guest id.
    pub fn verify_access_token(&self, token: &str) -> AppResult<Uuid> {
        let claims = self.verify_token(token)?;

        if claims.token_type != ACCESS {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthError("Invalid access token subject".to_string()))
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }

    pub fn get_verified_token_expires_in(&self) -> i64 {
        self.verified_token_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 3600, 900)
    }

    #[test]
    fn test_verified_token() {
        let jwt = service();
        let token = jwt.generate_verified_token("user@gmail.com").unwrap();
        assert_eq!(jwt.verify_verified_token(&token).unwrap(), "user@gmail.com");
        // not usable as a session
        assert!(jwt.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_access_token() {
        let jwt = service();
        let id = Uuid::new_v4();
        let token = jwt.generate_access_token(id).unwrap();
        assert_eq!(jwt.verify_access_token(&token).unwrap(), id);
        assert!(jwt.verify_verified_token(&token).is_err());
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let token = JwtService::new("other", 3600, 900)
            .generate_verified_token("user@gmail.com")
            .unwrap();
        assert!(matches!(
            service().verify_verified_token(&token),
            Err(AppError::JwtError(_))
        ));
    }
}
