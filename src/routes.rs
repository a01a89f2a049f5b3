use crate::{
    api::{cache, dashboard, division, employee, report, section, sub_section, sync, transfer},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(60_000 / requests_per_min as u64)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_default();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth").service(
            web::resource("/login")
                .wrap(login_limiter)
                .route(web::post().to(handlers::login)),
        ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/auth/me").route(web::get().to(handlers::me)))
            .service(
                web::scope("/divisions")
                    .service(
                        web::resource("")
                            .route(web::get().to(division::list_divisions))
                            .route(web::post().to(division::create_division)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(division::get_division))
                            .route(web::put().to(division::update_division))
                            .route(web::delete().to(division::delete_division)),
                    ),
            )
            .service(
                web::scope("/sections")
                    .service(
                        web::resource("")
                            .route(web::get().to(section::list_sections))
                            .route(web::post().to(section::create_section)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(section::get_section))
                            .route(web::put().to(section::update_section))
                            .route(web::delete().to(section::delete_section)),
                    ),
            )
            .service(
                web::scope("/subsections")
                    .service(
                        web::resource("")
                            .route(web::get().to(sub_section::list_sub_sections))
                            .route(web::post().to(sub_section::create_sub_section)),
                    )
                    // /subsections/transfers/{employee_id}
                    .service(
                        web::resource("/transfers/{employee_id}")
                            .route(web::delete().to(transfer::recall_employee)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(sub_section::get_sub_section))
                            .route(web::put().to(sub_section::update_sub_section))
                            .route(web::delete().to(sub_section::delete_sub_section)),
                    )
                    // /subsections/{id}/transfers
                    .service(
                        web::resource("/{id}/transfers")
                            .route(web::get().to(transfer::list_transfers))
                            .route(web::post().to(transfer::transfer_employee)),
                    ),
            )
            .service(
                web::scope("/employees")
                    .service(web::resource("").route(web::get().to(employee::list_employees)))
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(employee::get_employee)),
                    ),
            )
            .service(
                web::scope("/reports/ultra-fast")
                    .route("/division", web::get().to(report::division_report))
                    .route("/section", web::get().to(report::section_report))
                    .route("/employee", web::get().to(report::employee_report))
                    .route("/summary", web::get().to(report::summary_report))
                    .route("/summary/rebuild", web::post().to(report::rebuild_summary))
                    .route("/cache", web::delete().to(report::clear_report_cache)),
            )
            .service(
                web::scope("/cache")
                    .route("", web::delete().to(cache::clear))
                    .route("/status", web::get().to(cache::status))
                    .route("/refresh", web::post().to(cache::refresh))
                    .route("/subsections", web::get().to(cache::sub_sections))
                    .route("/users", web::get().to(cache::users))
                    .route("/attendance-count", web::get().to(cache::attendance_count)),
            )
            .service(
                web::scope("/dashboard")
                    .route("/stats", web::get().to(dashboard::stats))
                    .route(
                        "/recent-activities",
                        web::get().to(dashboard::recent_activities),
                    ),
            )
            .service(web::scope("/sync").route("/hris", web::post().to(sync::sync_hris))),
    );
}
