//! Entry point for the gateway: the HTTP-facing upload/download
//! surface that drives the storage pipeline, replication manager,
//! and metadata registry end to end.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::Multipart;
use axum::extract::{FromRef, Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use chunkmesh::config::GatewayConfig;
use chunkmesh::gateway::{Gateway, UploadOutcome, VerifyOutcome};
use chunkmesh::net::{PeerSource, StorageClient, TrackerClient};
use chunkmesh::registry::{FileManifest, InMemoryRegistry, MetadataRegistry};
use chunkmesh::replication::ReplicationManager;
use chunkmesh::CoreError;

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.kind(), "detail": self.0.to_string() })))
            .into_response()
    }
}

#[derive(Deserialize)]
struct DownloadQuery {
    key: String,
}

#[derive(Serialize)]
struct FileListResponse {
    total_files: usize,
    files: Vec<FileManifest>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    active_storage_nodes: usize,
    total_files: usize,
}

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    peers: Arc<dyn PeerSource>,
}

impl FromRef<AppState> for Arc<Gateway> {
    fn from_ref(state: &AppState) -> Self {
        state.gateway.clone()
    }
}

impl FromRef<AppState> for Arc<dyn PeerSource> {
    fn from_ref(state: &AppState) -> Self {
        state.peers.clone()
    }
}

async fn upload(
    State(gateway): State<Arc<Gateway>>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, ApiError> {
    let mut filename = "upload.bin".to_string();
    let mut content = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(CoreError::InvalidInput(e.to_string())))?
    {
        if let Some(name) = field.file_name() {
            filename = name.to_string();
        }
        content = field
            .bytes()
            .await
            .map_err(|e| ApiError(CoreError::InvalidInput(e.to_string())))?
            .to_vec();
    }

    if content.is_empty() {
        return Err(ApiError(CoreError::InvalidInput("no file field in upload".into())));
    }

    let outcome = gateway.upload(&filename, &content, "anonymous").await?;
    Ok(Json(outcome))
}

async fn download(
    State(gateway): State<Arc<Gateway>>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let outcome = gateway.download(&file_id, &query.key).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/octet-stream")
        .header(
            "content-disposition",
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", outcome.filename))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        )
        .header("X-File-Id", HeaderValue::from_str(&file_id).expect("file id is valid header value"))
        .body(Body::from(outcome.data))
        .expect("response with known-valid headers always builds");
    Ok(response)
}

async fn list_files(State(gateway): State<Arc<Gateway>>) -> Json<FileListResponse> {
    let files = gateway.list_files();
    Json(FileListResponse {
        total_files: files.len(),
        files,
    })
}

async fn verify_file(
    State(gateway): State<Arc<Gateway>>,
    Path(file_id): Path<String>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    Ok(Json(gateway.verify(&file_id).await?))
}

async fn health(
    State(gateway): State<Arc<Gateway>>,
    State(peers): State<Arc<dyn PeerSource>>,
) -> Json<HealthResponse> {
    let active = peers.active_peers().await.unwrap_or_default().len();
    Json(HealthResponse {
        status: "healthy",
        service: "gateway",
        active_storage_nodes: active,
        total_files: gateway.list_files().len(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::parse();

    let peers: Arc<dyn PeerSource> = Arc::new(TrackerClient::new(&config.dht_tracker_url));
    let transport = Arc::new(StorageClient::new());
    let replication = Arc::new(ReplicationManager::new(
        peers.clone(),
        transport.clone(),
        config.replication_factor,
    ));
    let registry: Arc<dyn MetadataRegistry> = Arc::new(InMemoryRegistry::new());
    let gateway = Arc::new(Gateway::new(registry, replication, transport, config.chunk_size));

    let state = AppState { gateway, peers };

    let app = Router::new()
        .route("/upload", post(upload))
        .route("/download/:file_id", get(download))
        .route("/files", get(list_files))
        .route("/files/:file_id/verify", get(verify_file))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(%addr, replication_factor = config.replication_factor, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(chunkmesh::shutdown_signal())
        .await?;

    Ok(())
}
