pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::middleware::{hidden_paths, request_id, security};
use crate::config::IntakeConfig;
use crate::infrastructure::storage::StorageLayout;
use crate::services::admission::AdmissionPipeline;
use crate::services::quota::QuotaTracker;
use crate::services::retrieval::RetrievalService;
use crate::services::scan_gate::ScanGate;
use crate::services::scanner::VirusScanner;
use crate::services::staging::Stager;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload_files,
        api::handlers::files::get_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::files::UploadResponse,
            api::handlers::health::HealthResponse,
            models::CommittedFile,
            models::StorageUsage,
        )
    ),
    tags(
        (name = "files", description = "File intake and retrieval endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IntakeConfig>,
    pub layout: StorageLayout,
    pub stager: Arc<Stager>,
    pub pipeline: Arc<AdmissionPipeline>,
    pub retrieval: Arc<RetrievalService>,
    pub quota: Arc<QuotaTracker>,
    pub scan_gate: ScanGate,
}

impl AppState {
    /// Wires the intake services over a prepared storage layout.
    pub fn new(config: IntakeConfig, layout: StorageLayout, scanner: Arc<dyn VirusScanner>) -> Self {
        let quota = Arc::new(QuotaTracker::new(layout.root.clone(), config.max_storage));
        let scan_gate = ScanGate::new(scanner, config.scan_timeout);
        let stager = Arc::new(Stager::new(layout.staging.clone(), &config));
        let pipeline = Arc::new(AdmissionPipeline::new(quota.clone(), scan_gate.clone()));
        let retrieval = Arc::new(RetrievalService::new(layout.root.clone()));

        Self {
            config: Arc::new(config),
            layout,
            stager,
            pipeline,
            retrieval,
            quota,
            scan_gate,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    // Uploads and static serving share a prefix; the nested fallback serves
    // committed files read-only
    let uploads = Router::new()
        .route("/", post(api::handlers::files::upload_files))
        .fallback_service(ServeDir::new(&state.layout.root))
        .layer(from_fn(hidden_paths::hidden_path_guard));

    // Swagger UI needs scripts, so it stays outside the strict CSP
    Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .route("/files/:filename", get(api::handlers::files::get_file))
        .nest("/uploads", uploads)
        .layer(from_fn(security::security_headers))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outside TraceLayer so request spans carry the generated id
        .layer(from_fn(request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(DefaultBodyLimit::max(state.config.request_body_limit()))
        .with_state(state)
}
