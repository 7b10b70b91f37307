use axum::{
    Extension, Json,
    extract::{Path, State},
};
use rust_i18n::t;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::middleware::RequestLocale;
use crate::services::showplan::{
    BuildOptions, GraphView, Operation, OperationKind, PlanSource, ShowPlanGraph, ShowPlanRow,
    StatementFailure,
};
use crate::utils::error::{ApiError, ApiResult};

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ShowPlanRequest {
    /// ShowPlan XML as produced by `SET STATISTICS XML` or `SET SHOWPLAN_XML`
    pub xml: String,
    /// Live query statistics: IF/ELSE branches become separate statements
    #[serde(default)]
    pub live: bool,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecordSetRequest {
    pub rows: Vec<ShowPlanRow>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatementError {
    pub statement_index: usize,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ShowPlanResponse {
    #[schema(value_type = Vec<Object>)]
    pub graphs: Vec<GraphView>,
    pub errors: Vec<StatementError>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OperationResponse {
    pub kind: String,
    pub name: String,
    #[schema(value_type = Object)]
    pub operation: Operation,
    /// False when the catch-all entry was returned
    pub known: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Build one graph per statement of a ShowPlan XML document
#[utoipa::path(
    post,
    path = "/api/showplan/graphs",
    request_body = ShowPlanRequest,
    responses(
        (status = 200, description = "Graphs and per-statement failures", body = ShowPlanResponse),
        (status = 400, description = "Payload is not a ShowPlan document"),
        (status = 413, description = "Payload exceeds the configured limit")
    ),
    tag = "ShowPlan"
)]
pub async fn build_graphs(
    State(state): State<Arc<crate::AppState>>,
    Extension(locale): Extension<RequestLocale>,
    Json(request): Json<ShowPlanRequest>,
) -> ApiResult<Json<ShowPlanResponse>> {
    let locale = locale.apply();
    check_payload(&state, request.xml.len())?;

    let options = build_options(&state, request.live);
    let output = state.builder.build(PlanSource::Xml(request.xml), &options)?;

    tracing::info!(
        "Built {} showplan graphs ({} statements failed, live={})",
        output.graphs.len(),
        output.errors.len(),
        options.live
    );

    Ok(Json(ShowPlanResponse {
        graphs: views(&output.graphs, locale),
        errors: output.errors.into_iter().map(statement_error).collect(),
    }))
}

/// Build only the statement at `index`
#[utoipa::path(
    post,
    path = "/api/showplan/graphs/{index}",
    params(
        ("index" = usize, Path, description = "Zero-based statement index")
    ),
    request_body = ShowPlanRequest,
    responses(
        (status = 200, description = "Graph of the statement"),
        (status = 400, description = "Payload is not a ShowPlan document"),
        (status = 404, description = "Statement index out of range")
    ),
    tag = "ShowPlan"
)]
pub async fn build_graph(
    State(state): State<Arc<crate::AppState>>,
    Extension(locale): Extension<RequestLocale>,
    Path(index): Path<usize>,
    Json(request): Json<ShowPlanRequest>,
) -> ApiResult<Json<GraphView>> {
    let locale = locale.apply();
    check_payload(&state, request.xml.len())?;

    let options = build_options(&state, request.live);
    let graph = state.builder.build_statement(PlanSource::Xml(request.xml), &options, index)?;

    tracing::info!("Built showplan graph for statement {} ({} nodes)", index, graph.node_count());
    Ok(Json(GraphView::new(&graph, locale)))
}

/// Build graphs from `SET SHOWPLAN_ALL` / `SET STATISTICS PROFILE` rows
#[utoipa::path(
    post,
    path = "/api/showplan/record-set",
    request_body = RecordSetRequest,
    responses(
        (status = 200, description = "One graph per StmtId", body = ShowPlanResponse),
        (status = 400, description = "Rows do not form a plan tree")
    ),
    tag = "ShowPlan"
)]
pub async fn build_record_set(
    State(state): State<Arc<crate::AppState>>,
    Extension(locale): Extension<RequestLocale>,
    Json(request): Json<RecordSetRequest>,
) -> ApiResult<Json<ShowPlanResponse>> {
    let locale = locale.apply();
    let row_count = request.rows.len();

    let options = build_options(&state, false);
    let output = state.builder.build(PlanSource::RecordSet(request.rows), &options)?;

    tracing::info!(
        "Built {} showplan graphs from {} record set rows ({} statements failed)",
        output.graphs.len(),
        row_count,
        output.errors.len()
    );
    Ok(Json(ShowPlanResponse {
        graphs: views(&output.graphs, locale),
        errors: output.errors.into_iter().map(statement_error).collect(),
    }))
}

/// Look up display metadata for an operator, statement or cursor type
#[utoipa::path(
    get,
    path = "/api/showplan/operations/{kind}/{name}",
    params(
        ("kind" = String, Path, description = "physical, logical, statement or cursor"),
        ("name" = String, Path, description = "Operator name, e.g. \"Index Seek\" or \"IndexSeek\"")
    ),
    responses(
        (status = 200, description = "Catalog entry", body = OperationResponse),
        (status = 400, description = "Unknown operation kind")
    ),
    tag = "ShowPlan"
)]
pub async fn get_operation(
    State(state): State<Arc<crate::AppState>>,
    Extension(locale): Extension<RequestLocale>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<Json<OperationResponse>> {
    let locale = locale.apply();
    let operation_kind: OperationKind = kind.parse().map_err(|_| {
        ApiError::validation_error(t!("showplan.unknown_operation_kind", locale = locale, kind = kind))
    })?;

    let catalog = state.builder.catalog();
    Ok(Json(OperationResponse {
        known: catalog.contains(operation_kind, &name),
        operation: catalog.lookup(operation_kind, &name),
        kind,
        name,
    }))
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

// ============================================================================
// Helpers
// ============================================================================

fn check_payload(state: &crate::AppState, size: usize) -> ApiResult<()> {
    let limit = state.config.showplan.max_payload_bytes;
    if size > limit {
        tracing::warn!("Rejected showplan payload of {} bytes (limit {})", size, limit);
        return Err(ApiError::payload_too_large(size, limit));
    }
    Ok(())
}

fn build_options(state: &crate::AppState, live: bool) -> BuildOptions {
    BuildOptions { live, isolate_statement_failures: state.config.showplan.isolate_statement_failures }
}

fn views(graphs: &[ShowPlanGraph], locale: &str) -> Vec<GraphView> {
    graphs.iter().map(|graph| GraphView::new(graph, locale)).collect()
}

fn statement_error(failure: StatementFailure) -> StatementError {
    StatementError {
        statement_index: failure.statement_index,
        message: ApiError::from(failure.error).localized_message(),
    }
}
