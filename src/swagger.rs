use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::guest::send_code,
        handlers::guest::verify_code,
        handlers::guest::check_email,
        handlers::guest::complete,
        handlers::guest::me,
    ),
    components(
        schemas(
            SendCodeRequest,
            SendCodeResponse,
            VerifyCodeRequest,
            VerifyCodeResponse,
            CheckEmailRequest,
            CompleteGuestRequest,
            GuestAuthResponse,
            GuestProfileResponse,
            GuestResponse,
            ErrorResponse,
            OkResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "guest", description = "Guest email verification and onboarding API"),
    ),
    info(
        title = "Guest Verification API",
        version = "0.1.0",
        description = "One-time code verification for external guests of newsroom bookings"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_guest_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/guest/send-code",
            "/guest/verify-code",
            "/guest/check-email",
            "/guest/complete",
            "/guest/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
