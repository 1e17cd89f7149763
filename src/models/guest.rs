use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestAccount {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<GuestAccount> for GuestResponse {
    fn from(guest: GuestAccount) -> Self {
        Self {
            id: guest.id,
            email: guest.email,
            display_name: guest.display_name,
            has_password: guest.password_hash.is_some(),
            created_at: guest.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendCodeRequest {
    #[schema(example = "expert@gmail.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeResponse {
    pub ok: bool,
    pub ttl_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    #[schema(example = "expert@gmail.com")]
    pub subject: String,
    #[schema(example = "483920")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    pub ok: bool,
    pub verification_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckEmailRequest {
    #[schema(example = "expert@gmail.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGuestRequest {
    pub verification_token: String,
    #[schema(example = "Password123")]
    pub password: Option<String>,
    #[schema(example = "Dr. Jane Doe")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestAuthResponse {
    pub ok: bool,
    pub guest: GuestResponse,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GuestProfileResponse {
    pub ok: bool,
    pub guest: GuestResponse,
}
