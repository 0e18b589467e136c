use crate::{
    api::{attendance, report, work_site},
    auth::middleware::auth_middleware,
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

    let check_in_limiter = Arc::new(build_limiter(config.rate_check_in_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    // /attendance/check-in gets its own, tighter limiter
                    .service(
                        web::resource("/check-in")
                            .wrap(check_in_limiter.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(web::resource("/current").route(web::get().to(attendance::current)))
                    .service(web::resource("/my-stats").route(web::get().to(attendance::my_stats)))
                    .service(
                        web::resource("/absence").route(web::put().to(attendance::set_absence)),
                    ),
            )
            .service(
                web::scope("/sites")
                    // /sites
                    .service(
                        web::resource("")
                            .route(web::get().to(work_site::list_sites))
                            .route(web::post().to(work_site::create_site)),
                    )
                    // /sites/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(work_site::get_site))
                            .route(web::put().to(work_site::update_site)),
                    )
                    .service(
                        web::resource("/{id}/toggle-status")
                            .route(web::patch().to(work_site::toggle_status)),
                    )
                    .service(
                        web::resource("/{id}/regenerate-token")
                            .route(web::post().to(work_site::regenerate_token)),
                    ),
            )
            .service(
                web::scope("/report")
                    .service(web::resource("/grid").route(web::get().to(report::grid)))
                    .service(
                        web::resource("/tally/{employee_id}").route(web::get().to(report::tally)),
                    )
                    .service(
                        web::resource("/all-stats").route(web::get().to(report::all_stats)),
                    )
                    .service(
                        web::resource("/export/csv").route(web::get().to(report::export_csv)),
                    ),
            ),
    );
}
