use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use guest_verify_backend::{
    config::Config,
    external::LogCodeSender,
    handlers,
    middlewares::{GuestAuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = match Config::from_toml() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Refusing to start: {e}");
            return Err(std::io::Error::other(e.to_string()));
        }
    };

    let production = config.server.production;
    let echo_code = config.verification.echoes_code(production);
    if echo_code {
        log::warn!("Development mode: verification codes are echoed in API responses");
    }

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.verified_token_expires_in,
    );

    // email delivery is stubbed; the log sender only reveals codes when echoing is allowed
    let sender = Arc::new(LogCodeSender::new(echo_code));
    let verification_service = VerificationService::new(&config.verification, production, sender);
    let guest_service =
        GuestAccountService::new(jwt_service.clone(), verification_service.policy().clone());

    log::info!(
        "Guest verification ready: {} claimed domains, code ttl {}s, max attempts {}, {} requests per {}s",
        verification_service.policy().claimed_domains().len(),
        config.verification.code_ttl_seconds,
        config.verification.max_attempts,
        config.verification.rate_limit_max_requests,
        config.verification.rate_limit_window_seconds,
    );

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origins = config.server.allowed_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&allowed_origins))
            .wrap(GuestAuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(verification_service.clone()))
            .app_data(web::Data::new(guest_service.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .configure(swagger_config)
            .service(web::scope("/api/v1").configure(handlers::guest_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
