use crate::{
    api::{reject_request, request, request_dates, status_log},
    config::Config,
    error::LifecycleError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build a per-scope limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_else(GovernorConfig::default);
        Governor::new(&cfg)
    }

    let limiter = Arc::new(build_limiter(config.rate_lifecycle_per_min));

    // Malformed bodies and path segments get the same {code, message} shape as every other error
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        LifecycleError::InvalidInput(format!("Invalid request body: {}", err)).into()
    }));
    cfg.app_data(web::PathConfig::default().error_handler(|err, _req| {
        LifecycleError::InvalidInput(format!("Invalid path parameter: {}", err)).into()
    }));

    cfg.service(
        web::scope("/request")
            .wrap(limiter.clone())
            .service(web::resource("/create").route(web::post().to(request::create_request)))
            // /request/get_request/{request_id}
            .service(
                web::resource("/get_request/{request_id}")
                    .route(web::get().to(request::get_request)),
            )
            // /request/get_all_requests/{staff_id}
            .service(
                web::resource("/get_all_requests/{staff_id}")
                    .route(web::get().to(request::get_all_requests)),
            )
            .service(
                web::resource("/update_reason").route(web::put().to(request::update_reason)),
            ),
    );

    cfg.service(
        web::scope("/request_dates")
            .wrap(limiter.clone())
            .service(
                web::resource("/get_by_request_id/{request_id}")
                    .route(web::get().to(request_dates::get_by_request_id)),
            )
            .service(
                web::resource("/get_request_dates_by_request_ids")
                    .route(web::post().to(request_dates::get_request_dates_by_request_ids)),
            )
            .service(
                web::resource("/get_pending/{request_id}")
                    .route(web::get().to(request_dates::get_pending)),
            )
            .service(
                web::resource("/change_all_status")
                    .route(web::put().to(request_dates::change_all_status)),
            )
            .service(
                web::resource("/change_partial_status")
                    .route(web::put().to(request_dates::change_partial_status)),
            )
            .service(
                web::resource("/auto_reject").route(web::put().to(request_dates::auto_reject)),
            ),
    );

    cfg.service(
        web::scope("/status_log")
            .wrap(limiter.clone())
            .service(web::resource("/add_event").route(web::post().to(status_log::add_event)))
            // /status_log/get_logs/{request_id}
            .service(
                web::resource("/get_logs/{request_id}").route(web::get().to(status_log::get_logs)),
            ),
    );

    cfg.service(
        web::scope("/reject_requests")
            .wrap(limiter)
            .service(
                web::resource("/reject_request")
                    .route(web::put().to(reject_request::reject_request)),
            ),
    );
}
