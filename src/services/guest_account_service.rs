use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::DomainPolicy;
use crate::utils::*;

const MAX_DISPLAY_NAME_CHARS: usize = 100;

#[derive(Debug, Default)]
struct GuestDirectory {
    by_id: HashMap<Uuid, GuestAccount>,
    ids_by_email: HashMap<String, Uuid>,
}

/// Turns a verified email into a guest account and session.
#[derive(Clone)]
pub struct GuestAccountService {
    directory: Arc<RwLock<GuestDirectory>>,
    jwt_service: JwtService,
    policy: DomainPolicy,
}

impl GuestAccountService {
    pub fn new(jwt_service: JwtService, policy: DomainPolicy) -> Self {
        Self {
            directory: Arc::new(RwLock::new(GuestDirectory::default())),
            jwt_service,
            policy,
        }
    }

    pub async fn complete(&self, request: CompleteGuestRequest) -> AppResult<GuestAuthResponse> {
        let email = self
            .jwt_service
            .verify_verified_token(request.verification_token.trim())?;

        // the domain may have been claimed since the code was verified
        let decision = self.policy.evaluate(&email);
        if let Some(reason) = decision.reason {
            return Err(AppError::from_policy(reason, decision.blocked_domain));
        }

        let password_hash = match request.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                let password = password.to_string();
                // bcrypt is CPU bound; keep it off the async workers
                let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
                    .await
                    .map_err(|e| AppError::InternalError(format!("password hashing failed: {e}")))??;
                Some(hashed)
            }
            None => None,
        };
        let display_name = normalize_display_name(request.display_name.as_deref())?;

        let guest = {
            let mut guard = self.directory.write().await;
            let directory = &mut *guard;
            let now = Utc::now();

            let existing = directory.ids_by_email.get(&email).copied();
            match existing.and_then(|id| directory.by_id.get_mut(&id)) {
                Some(guest) => {
                    if password_hash.is_some() {
                        guest.password_hash = password_hash;
                    }
                    if display_name.is_some() {
                        guest.display_name = display_name;
                    }
                    guest.updated_at = now;
                    guest.clone()
                }
                None => {
                    let guest = GuestAccount {
                        id: Uuid::new_v4(),
                        email: email.clone(),
                        display_name,
                        password_hash,
                        created_at: now,
                        updated_at: now,
                    };
                    directory.ids_by_email.insert(email.clone(), guest.id);
                    directory.by_id.insert(guest.id, guest.clone());
                    log::info!("Created guest account {} for {}", guest.id, email);
                    guest
                }
            }
        };

        let access_token = self.jwt_service.generate_access_token(guest.id)?;

        Ok(GuestAuthResponse {
            ok: true,
            guest: GuestResponse::from(guest),
            access_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    pub async fn get(&self, guest_id: Uuid) -> AppResult<GuestAccount> {
        self.directory
            .read()
            .await
            .by_id
            .get(&guest_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Guest not found".to_string()))
    }
}

fn normalize_display_name(raw: Option<&str>) -> AppResult<Option<String>> {
    let Some(name) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(AppError::ValidationError(format!(
            "Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters"
        )));
    }
    Ok(Some(name.to_string()))
}
