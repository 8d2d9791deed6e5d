//! Application setup and router wiring.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use countries_client::CountriesClient;

use crate::kernel::admission::QuotaService;
use crate::kernel::scheduler::JobScheduler;
use crate::server::routes::{
    expand_niches_handler, health_handler, history_handler, job_file_handler, location_handler,
    metadata_handler, queue_handler, stop_handler, stream_handler, submit_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub quota: Arc<dyn QuotaService>,
    /// Country/city metadata client. Optional: without it, submitted
    /// locations are accepted unvalidated.
    pub countries: Option<Arc<CountriesClient>>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - allow any origin, the dashboard runs on a
    // separate host
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    Router::new()
        .route("/api/jobs", post(submit_handler))
        .route("/api/jobs/:id/events", get(stream_handler))
        .route("/api/jobs/:id/stop", post(stop_handler))
        .route("/api/jobs/:id/files/:name", get(job_file_handler))
        .route("/api/queue", get(queue_handler))
        .route("/api/history", get(history_handler))
        .route("/api/expand-niches", post(expand_niches_handler))
        .route("/api/metadata", get(metadata_handler))
        .route("/api/location", get(location_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
