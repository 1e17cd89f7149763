use actix_web::http::StatusCode;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::*;
use crate::services::{GuestAccountService, VerificationService};
use crate::utils::{JwtService, client_key};

fn request_client_key(req: &HttpRequest) -> String {
    let info = req.connection_info();
    let user_agent = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok());
    client_key(info.realip_remote_addr(), user_agent)
}

#[utoipa::path(
    post,
    path = "/guest/send-code",
    tag = "guest",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = SendCodeResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 403, description = "Domain claimed by an organization", body = ErrorResponse),
        (status = 429, description = "Too many requests from this client", body = ErrorResponse)
    )
)]
pub async fn send_code(
    verification_service: web::Data<VerificationService>,
    req: HttpRequest,
    request: web::Json<SendCodeRequest>,
) -> Result<HttpResponse> {
    let client = request_client_key(&req);
    match verification_service.issue(&request.email, &client).await {
        Ok(issued) => Ok(HttpResponse::Ok().json(SendCodeResponse {
            ok: true,
            ttl_seconds: issued.ttl_seconds,
            dev_code: issued.dev_code,
        })),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/guest/verify-code",
    tag = "guest",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted", body = VerifyCodeResponse),
        (status = 400, description = "not_found, expired, mismatch or invalid_input", body = ErrorResponse),
        (status = 429, description = "Attempt budget exhausted", body = ErrorResponse)
    )
)]
pub async fn verify_code(
    verification_service: web::Data<VerificationService>,
    jwt_service: web::Data<JwtService>,
    request: web::Json<VerifyCodeRequest>,
) -> Result<HttpResponse> {
    if request.subject.trim().is_empty() || request.code.trim().is_empty() {
        return Ok(
            AppError::ValidationError("subject and code are required".to_string())
                .error_response(),
        );
    }

    let subject = match verification_service
        .verify(&request.subject, &request.code)
        .await
    {
        Ok(subject) => subject,
        Err(failure) => return Ok(AppError::from(failure).error_response()),
    };

    match jwt_service.generate_verified_token(&subject) {
        Ok(token) => Ok(HttpResponse::Ok().json(VerifyCodeResponse {
            ok: true,
            verification_token: token,
            expires_in: jwt_service.get_verified_token_expires_in(),
        })),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/guest/check-email",
    tag = "guest",
    request_body = CheckEmailRequest,
    responses(
        (status = 200, description = "Email may be used as a guest", body = OkResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 403, description = "Domain claimed by an organization", body = ErrorResponse)
    )
)]
pub async fn check_email(
    verification_service: web::Data<VerificationService>,
    request: web::Json<CheckEmailRequest>,
) -> Result<HttpResponse> {
    let decision = verification_service.policy().evaluate(&request.email);
    match decision.reason {
        None => Ok(HttpResponse::Ok().json(OkResponse::new())),
        Some(PolicyRejection::InvalidEmail) => Ok(AppError::InvalidEmail.error_response()),
        Some(PolicyRejection::DomainBlocked) => {
            let domain = decision.blocked_domain.unwrap_or_default();
            Ok(HttpResponse::build(StatusCode::FORBIDDEN).json(ErrorResponse::new(
                "org_domain_blocked",
                format!(
                    "{domain} is managed by an organization. Ask your organization for an invite instead of signing up as a guest."
                ),
            )))
        }
    }
}

#[utoipa::path(
    post,
    path = "/guest/complete",
    tag = "guest",
    request_body = CompleteGuestRequest,
    responses(
        (status = 200, description = "Guest account ready", body = GuestAuthResponse),
        (status = 400, description = "Invalid password or display name", body = ErrorResponse),
        (status = 401, description = "Invalid verification token", body = ErrorResponse),
        (status = 403, description = "Domain claimed by an organization", body = ErrorResponse)
    )
)]
pub async fn complete(
    guest_service: web::Data<GuestAccountService>,
    request: web::Json<CompleteGuestRequest>,
) -> Result<HttpResponse> {
    match guest_service.complete(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/guest/me",
    tag = "guest",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current guest", body = GuestProfileResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 404, description = "Guest no longer exists", body = ErrorResponse)
    )
)]
pub async fn me(
    guest_service: web::Data<GuestAccountService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(guest_id) = req.extensions().get::<Uuid>().copied() else {
        return Ok(AppError::AuthError("Missing access token".to_string()).error_response());
    };

    match guest_service.get(guest_id).await {
        Ok(guest) => Ok(HttpResponse::Ok().json(GuestProfileResponse {
            ok: true,
            guest: GuestResponse::from(guest),
        })),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn guest_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/guest")
            .route("/send-code", web::post().to(send_code))
            .route("/verify-code", web::post().to(verify_code))
            .route("/check-email", web::post().to(check_email))
            .route("/complete", web::post().to(complete))
            .route("/me", web::get().to(me)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerificationConfig;
    use crate::external::LogCodeSender;
    use crate::middlewares::GuestAuthMiddleware;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct TestState {
        verification: VerificationService,
        guests: GuestAccountService,
        jwt: JwtService,
    }

    fn state(production: bool) -> TestState {
        let config = VerificationConfig {
            claimed_domains: vec!["acme.com".to_string()],
            expose_dev_code: true,
            ..VerificationConfig::default()
        };
        let jwt = JwtService::new("test-secret", 3600, 900);
        let verification =
            VerificationService::new(&config, production, Arc::new(LogCodeSender::new(false)));
        let guests = GuestAccountService::new(jwt.clone(), verification.policy().clone());
        TestState {
            verification,
            guests,
            jwt,
        }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .wrap(GuestAuthMiddleware::new($state.jwt.clone()))
                    .app_data(web::Data::new($state.verification.clone()))
                    .app_data(web::Data::new($state.guests.clone()))
                    .app_data(web::Data::new($state.jwt.clone()))
                    .service(web::scope("/api/v1").configure(guest_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_full_guest_flow() {
        let state = state(false);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .set_json(json!({ "email": "Expert@Gmail.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["ttlSeconds"], 600);
        let code = body["devCode"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/verify-code")
            .set_json(json!({ "subject": "expert@gmail.com", "code": "000000" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["reason"], "mismatch");

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/verify-code")
            .set_json(json!({ "subject": "expert@gmail.com", "code": code }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let token = body["verificationToken"].as_str().unwrap().to_string();
        assert_eq!(body["expiresIn"], 900);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/complete")
            .set_json(json!({
                "verificationToken": token,
                "password": "Password123",
                "displayName": "Dr. Expert"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["guest"]["email"], "expert@gmail.com");
        assert_eq!(body["guest"]["hasPassword"], true);
        let access = body["accessToken"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri("/api/v1/guest/me")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["guest"]["displayName"], "Dr. Expert");
    }

    #[actix_web::test]
    async fn test_send_code_blocked_and_invalid() {
        let state = state(false);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .set_json(json!({ "email": "user@sub.acme.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["reason"], "domain_blocked");

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .set_json(json!({ "email": "nobody" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["reason"], "invalid_email");
    }

    #[actix_web::test]
    async fn test_send_code_rate_limited_per_client() {
        let state = state(false);
        let app = app!(state);

        for _ in 0..5 {
            let req = test::TestRequest::post()
                .uri("/api/v1/guest/send-code")
                .insert_header(("User-Agent", "bot"))
                .set_json(json!({ "email": "guest@gmail.com" }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .insert_header(("User-Agent", "bot"))
            .set_json(json!({ "email": "guest@gmail.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("Retry-After"));
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["reason"], "rate_limited");
        assert!(body["retryAfter"].as_u64().unwrap() > 0);

        // a different user agent is a different client
        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .insert_header(("User-Agent", "browser"))
            .set_json(json!({ "email": "guest@gmail.com" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_production_hides_dev_code() {
        let state = state(true);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/send-code")
            .set_json(json!({ "email": "guest@gmail.com" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["ok"], true);
        assert!(body.get("devCode").is_none());
    }

    #[actix_web::test]
    async fn test_verify_code_errors() {
        let state = state(false);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/verify-code")
            .set_json(json!({ "subject": "guest@gmail.com", "code": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["reason"], "invalid_input");

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/verify-code")
            .set_json(json!({ "subject": "guest@gmail.com", "code": "123456" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["reason"], "not_found");
    }

    #[actix_web::test]
    async fn test_check_email() {
        let state = state(false);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/check-email")
            .set_json(json!({ "email": "guest@gmail.com" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "ok": true }));

        let req = test::TestRequest::post()
            .uri("/api/v1/guest/check-email")
            .set_json(json!({ "email": "editor@ACME.com" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["reason"], "org_domain_blocked");
        assert!(body["message"].as_str().unwrap().contains("acme.com"));
    }

    #[actix_web::test]
    async fn test_me_requires_access_token() {
        let state = state(false);
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/guest/me").to_request();
        let resp = test::try_call_service(&app, req).await;
        let err = resp.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

        let verified = state.jwt.generate_verified_token("guest@gmail.com").unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/guest/me")
            .insert_header(("Authorization", format!("Bearer {verified}")))
            .to_request();
        let resp = test::try_call_service(&app, req).await;
        assert!(resp.is_err());

        let unknown = state.jwt.generate_access_token(Uuid::new_v4()).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/guest/me")
            .insert_header(("Authorization", format!("Bearer {unknown}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
