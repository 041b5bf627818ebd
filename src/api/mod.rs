pub mod engine;
pub mod error;
pub mod health;
pub mod plans;
pub mod response;
pub mod settings;
pub mod tasks;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{app::AppState, config::Config};

/// Uploaded plan files are small XML documents; anything near this limit is
/// not a plan.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/api/initialize", post(settings::initialize))
        .route("/api/language/set", post(settings::set_language))
        .route("/api/language/get", post(settings::get_language))
        .route("/api/plan/all", post(plans::all))
        .route("/api/plan/checked", post(plans::checked))
        .route("/api/plan/info", post(plans::info))
        .route("/api/plan/create", post(plans::create))
        .route("/api/plan/import", post(plans::import))
        .route("/api/plan/remove", post(plans::remove))
        .route("/api/plan/removeall", post(plans::remove_all))
        .route("/api/plan/save", post(plans::save))
        .route("/api/plan/run", post(engine::run))
        .route("/api/plan/stop", post(engine::stop))
        .route("/api/engine/hosts", post(engine::hosts))
        .route("/api/engine/properties/read", post(engine::read_properties))
        .route("/api/engine/properties/write", post(engine::write_properties))
        .route("/api/task/all", post(tasks::all))
        .route("/api/task/one", post(tasks::one))
        .route("/api/task/statistics", post(tasks::statistics))
        .route("/api/task/samples", post(tasks::samples))
        .route("/api/task/summary", post(tasks::summary))
        .route("/api/task/log", post(tasks::run_log))
        .route("/api/task/report", post(tasks::report))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .fallback_service(
            ServeDir::new(&cfg.server.public_dir).append_index_html_on_directories(true),
        )
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::CorsLayer;
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}
