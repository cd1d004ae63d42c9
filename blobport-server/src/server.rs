use crate::config::Config;
use crate::error::Result;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use blobport_core::{BlobError, BlobRecord, BlobService, CreateParams, SourceDescriptor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub service: BlobService,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateBlobBody {
    #[serde(flatten)]
    source: SourceDescriptor,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

pub async fn run_server(config: Config) -> Result<()> {
    let backend = config.backend.builder().build()?;
    let service = BlobService::builder()
        .backend(backend)
        .id_field(config.id_field.clone())
        .build()?;

    let app = router(Arc::new(ServerState { service }), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        "Server listening on {} (backend: {})",
        config.bind_addr,
        config.backend.kind.as_str()
    );

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<ServerState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/blobs", post(create_blob))
        .route("/blobs/:id", get(get_blob).delete(remove_blob))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "id_field": state.service.id_field(),
    });

    (StatusCode::OK, Json(response))
}

async fn get_blob(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Response {
    match state.service.get(&id).await {
        Ok(record) => record_response(StatusCode::OK, record),
        Err(error) => error_response(error),
    }
}

async fn create_blob(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CreateBlobBody>,
) -> Response {
    let params = CreateParams {
        backend: body.params.map(Into::into).unwrap_or_default(),
    };

    match state.service.create(body.source, params).await {
        Ok(record) => record_response(StatusCode::CREATED, record),
        Err(error) => error_response(error),
    }
}

async fn remove_blob(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Response {
    match state.service.remove(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

fn record_response(status: StatusCode, record: BlobRecord) -> Response {
    let resp = ApiResponse {
        success: true,
        data: Some(record),
        error: None,
    };
    (status, Json(resp)).into_response()
}

fn error_status(error: &BlobError) -> StatusCode {
    match error {
        BlobError::InvalidInput(_) | BlobError::MalformedDataUri(_) => StatusCode::BAD_REQUEST,
        BlobError::BackendRead { .. } | BlobError::BackendDelete { .. }
            if error.is_not_found() =>
        {
            StatusCode::NOT_FOUND
        }
        BlobError::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: BlobError) -> Response {
    let status = error_status(&error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }

    let resp = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(error.to_string()),
    };
    (status, Json(resp)).into_response()
}
