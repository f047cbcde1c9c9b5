use crate::{
    api::{attendance, leave_request},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::bad_request,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Base64 selfies and doctor's notes travel inside JSON bodies.
const JSON_LIMIT_BYTES: usize = 8 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(60_000 / requests_per_min as u64)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(|| {
                tracing::warn!(requests_per_min, "Invalid rate limit; using governor defaults");
                GovernorConfig::default()
            });
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // malformed bodies and queries get the same error envelope as domain errors
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT_BYTES)
            .error_handler(|err, _| bad_request("invalid_json", err.to_string())),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _| bad_request("invalid_query", err.to_string())))
    .app_data(web::PathConfig::default().error_handler(|err, _| bad_request("invalid_path", err.to_string())));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    let attendance_scope = web::scope("/attendance")
        .route("/status", web::post().to(attendance::status))
        .route("/check-in", web::post().to(attendance::check_in))
        .route("/check-out", web::post().to(attendance::check_out))
        .route("/marks", web::get().to(attendance::marks))
        .route("/day", web::get().to(attendance::day));

    #[cfg(feature = "debug-reset")]
    let attendance_scope = attendance_scope.route("/debug/reset-today", web::post().to(attendance::reset_today));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .route("/me", web::get().to(handlers::me))
            .route("/config/office", web::get().to(attendance::office_config))
            .service(attendance_scope)
            .service(
                web::scope("/leave")
                    .route("/quota", web::get().to(leave_request::quota))
                    // /leave/paid
                    .service(
                        web::resource("/paid")
                            .route(web::post().to(leave_request::request_paid))
                            .route(web::get().to(leave_request::list_paid)),
                    )
                    .route("/paid/{id}/approve", web::post().to(leave_request::approve_paid))
                    .route("/paid/{id}/reject", web::post().to(leave_request::reject_paid))
                    // /leave/sick
                    .service(
                        web::resource("/sick")
                            .route(web::post().to(leave_request::request_sick))
                            .route(web::get().to(leave_request::list_sick)),
                    )
                    .route("/sick/{id}/approve", web::post().to(leave_request::approve_sick))
                    .route("/sick/{id}/reject", web::post().to(leave_request::reject_sick)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair; the old refresh token is revoked
