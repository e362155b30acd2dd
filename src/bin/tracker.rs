//! Entry point for the DHT tracker service: storage node
//! registration, heartbeats, and chunk location tracking over HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use chunkmesh::config::TrackerConfig;
use chunkmesh::hasher::Digest;
use chunkmesh::peer_directory::{PeerDirectory, PeerInfo};
use chunkmesh::CoreError;

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.kind(), "detail": self.0.to_string() })))
            .into_response()
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    peer_id: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    peer_id: String,
}

#[derive(Deserialize)]
struct AnnounceRequest {
    chunk_hash: Digest,
    peer_id: String,
}

#[derive(Deserialize)]
struct ClosestQuery {
    target_hash: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    3
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    active_nodes: usize,
    tracked_chunks: usize,
}

async fn register_node(
    State(dir): State<Arc<PeerDirectory>>,
    Json(req): Json<RegisterRequest>,
) -> Json<PeerInfo> {
    Json(dir.register(&req.peer_id, &req.endpoint))
}

async fn heartbeat(
    State(dir): State<Arc<PeerDirectory>>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<StatusCode, ApiError> {
    dir.heartbeat(&req.peer_id)?;
    Ok(StatusCode::OK)
}

async fn list_nodes(State(dir): State<Arc<PeerDirectory>>) -> Json<Vec<PeerInfo>> {
    Json(dir.active_peers())
}

async fn closest_nodes(
    State(dir): State<Arc<PeerDirectory>>,
    Query(query): Query<ClosestQuery>,
) -> Json<Vec<PeerInfo>> {
    Json(dir.lookup_nearest(&query.target_hash, query.k))
}

async fn announce_chunk(
    State(dir): State<Arc<PeerDirectory>>,
    Json(req): Json<AnnounceRequest>,
) -> Result<StatusCode, ApiError> {
    dir.announce(req.chunk_hash, &req.peer_id)?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct ChunkLocationsResponse {
    chunk_hash: Digest,
    nodes: Vec<PeerInfo>,
}

async fn chunk_locations(
    State(dir): State<Arc<PeerDirectory>>,
    Path(digest): Path<Digest>,
) -> Json<ChunkLocationsResponse> {
    Json(ChunkLocationsResponse {
        chunk_hash: digest,
        nodes: dir.locate(&digest),
    })
}

async fn health(State(dir): State<Arc<PeerDirectory>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "tracker",
        active_nodes: dir.peer_count(),
        tracked_chunks: dir.tracked_chunk_count(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = TrackerConfig::parse();
    let directory = Arc::new(PeerDirectory::new(Duration::from_secs(config.node_stale_timeout)));

    let app = Router::new()
        .route("/nodes/register", post(register_node))
        .route("/nodes/heartbeat", post(heartbeat))
        .route("/nodes", get(list_nodes))
        .route("/nodes/closest", get(closest_nodes))
        .route("/chunks/announce", post(announce_chunk))
        .route("/chunks/:digest/locations", get(chunk_locations))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(directory);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(%addr, stale_timeout = config.node_stale_timeout, "tracker starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(chunkmesh::shutdown_signal())
        .await?;

    Ok(())
}
