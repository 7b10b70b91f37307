//! SQL Server execution plan service
//!
//! Parses ShowPlan XML (and legacy `SHOWPLAN_ALL` rows) into operator graphs
//! and serves them over HTTP.

rust_i18n::i18n!("locales", fallback = "en");

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::services::showplan::{OperatorCatalog, ShowPlanBuilder};

/// JSON escaping can double a plan's size on the wire
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

pub struct AppState {
    pub builder: ShowPlanBuilder,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(OperatorCatalog::new());
        Self { builder: ShowPlanBuilder::new(catalog), config }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::showplan::build_graphs,
        handlers::showplan::build_graph,
        handlers::showplan::build_record_set,
        handlers::showplan::get_operation,
        handlers::showplan::health,
    ),
    components(schemas(
        handlers::showplan::ShowPlanRequest,
        handlers::showplan::RecordSetRequest,
        handlers::showplan::ShowPlanResponse,
        handlers::showplan::StatementError,
        handlers::showplan::OperationResponse,
        handlers::showplan::HealthResponse,
        services::showplan::ShowPlanRow,
    )),
    tags(
        (name = "ShowPlan", description = "Execution plan graphs"),
        (name = "System", description = "Service status")
    )
)]
pub struct ApiDoc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .showplan
        .max_payload_bytes
        .saturating_mul(2)
        .saturating_add(BODY_LIMIT_HEADROOM);

    let api = Router::new()
        .route("/api/showplan/graphs", post(handlers::showplan::build_graphs))
        .route("/api/showplan/graphs/:index", post(handlers::showplan::build_graph))
        .route("/api/showplan/record-set", post(handlers::showplan::build_record_set))
        .route("/api/showplan/operations/:kind/:name", get(handlers::showplan::get_operation))
        .route("/api/health", get(handlers::showplan::health))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::locale_middleware))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    api.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
