use std::sync::Arc;

use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

use crate::{
    api::{admin, attendance, location, uploads},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/signup")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::signup)),
            )
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::reset_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("").route(web::post().to(attendance::check_in)),
                    )
                    // literal route must come before the {date} matcher
                    .service(
                        web::resource("/today").route(web::get().to(attendance::today)),
                    )
                    .service(
                        web::resource("/{date:\\d{4}-\\d{2}-\\d{2}}")
                            .route(web::get().to(attendance::by_date)),
                    )
                    .service(
                        web::resource("/{id:\\d+}")
                            .route(web::delete().to(attendance::delete_record)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .service(
                        web::resource("/settings")
                            .route(web::get().to(admin::get_settings))
                            .route(web::put().to(admin::put_settings)),
                    )
                    .service(
                        web::resource("/attendance")
                            .route(web::get().to(admin::daily_roster)),
                    )
                    .service(
                        web::resource("/attendance/{id}/flag")
                            .route(web::put().to(admin::flag_attendance)),
                    )
                    .service(web::resource("/users").route(web::get().to(admin::list_users)))
                    .service(
                        web::resource("/users/{id}/attendance")
                            .route(web::get().to(admin::user_month)),
                    )
                    .service(
                        web::resource("/users/{id}/export")
                            .route(web::get().to(admin::export_user_month)),
                    )
                    .service(web::resource("/export").route(web::get().to(admin::export_range))),
            )
            .service(
                web::scope("/location")
                    .service(web::resource("/ip").route(web::get().to(location::ip_location))),
            )
            .service(
                web::scope("/uploads")
                    .service(web::resource("/photo").route(web::post().to(uploads::upload_photo))),
            ),
    );
}
