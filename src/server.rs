use crate::app::ports::IdentifierReaderPort;
use crate::app::EnrichUseCase;
use crate::error::EnrichError;
use crate::storage::Storage;
use crate::types::{CardFilter, EnrichedRecord};
use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Extension, Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub use_case: Arc<EnrichUseCase>,
    pub storage: Arc<dyn Storage>,
    pub reader: Arc<dyn IdentifierReaderPort>,
    /// Process-wide token. Batches run on child tokens of it.
    pub shutdown: CancellationToken,
    pub metrics: Option<PrometheusHandle>,
}

/// Error body `{"error": message}` with a status derived from the error kind
pub struct ApiError(EnrichError);

impl From<EnrichError> for ApiError {
    fn from(e: EnrichError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EnrichError::BatchInProgress => StatusCode::CONFLICT,
            EnrichError::NotFound(_) => StatusCode::NOT_FOUND,
            EnrichError::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(kind = self.0.kind(), "Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "card-enricher",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn process_stored(Extension(state): Extension<AppState>) -> ApiResult<Response> {
    let batch = state
        .use_case
        .trigger_from_storage(state.shutdown.child_token())
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "count": batch.count() })),
    )
        .into_response())
}

async fn process_file(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Response> {
    let batch = state
        .use_case
        .trigger_from_file(state.reader.as_ref(), &body, state.shutdown.child_token())
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "count": batch.count() })),
    )
        .into_response())
}

async fn enrich_card(
    Extension(state): Extension<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Json<EnrichedRecord>> {
    Ok(Json(state.use_case.enrich_single(&number).await?))
}

async fn list_cards(
    Extension(state): Extension<AppState>,
    Query(filter): Query<CardFilter>,
) -> ApiResult<Response> {
    let cards = state.storage.list(&filter).await?;
    Ok(Json(cards).into_response())
}

async fn insert_card(
    Extension(state): Extension<AppState>,
    Json(record): Json<EnrichedRecord>,
) -> ApiResult<Response> {
    let id = state.storage.insert(&record).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn update_card(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
    Json(record): Json<EnrichedRecord>,
) -> ApiResult<Response> {
    let id = Uuid::parse_str(&key)
        .map_err(|_| EnrichError::Parse(format!("invalid card id: {key}")))?;
    match state.storage.update_by_id(id, &record).await? {
        Some(card) => Ok(Json(card).into_response()),
        None => Err(EnrichError::NotFound(id.to_string()).into()),
    }
}

async fn delete_card(
    Extension(state): Extension<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Response> {
    if state.storage.delete_by_identifier(&number).await? {
        Ok(Json(json!({ "deleted": number })).into_response())
    } else {
        Err(EnrichError::NotFound(number).into())
    }
}

async fn render_metrics(Extension(state): Extension<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/process", post(process_stored))
        .route("/process/file", post(process_file))
        .route("/cards", get(list_cards))
        .route("/cards/:number/enrich", post(enrich_card))
        .route("/card", post(insert_card))
        .route("/card/:key", put(update_card).delete(delete_card))
        .route("/metrics", get(render_metrics))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Serve until the shutdown token is cancelled.
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
