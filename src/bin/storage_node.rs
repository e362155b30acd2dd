//! Entry point for a storage node: stores encrypted chunks on disk,
//! answers proof-of-retrievability challenges, and registers itself
//! with the tracker on startup with a periodic heartbeat.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use chunkmesh::config::StorageNodeConfig;
use chunkmesh::hasher::Digest;
use chunkmesh::net::TrackerClient;
use chunkmesh::store::{self, ChunkStore, StoreOutcome};
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
struct StoreChunkRequest {
    chunk_hash: Digest,
    data: String,
}

#[derive(Serialize)]
struct StoreChunkResponse {
    status: &'static str,
    digest: String,
    size_bytes: usize,
    node_id: String,
}

#[derive(Deserialize)]
struct ProveRequest {
    challenge: String,
}

#[derive(Serialize)]
struct ProveResponse {
    digest: String,
    challenge: String,
    proof: String,
    node_id: String,
}

#[derive(Serialize)]
struct ChunkListResponse {
    node_id: String,
    chunks: Vec<Digest>,
    total_count: usize,
    total_size: u64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    node_id: String,
    stored_chunks: usize,
    total_size_bytes: u64,
}

struct AppState {
    store: ChunkStore,
    node_id: String,
}

async fn store_chunk(
    State(app): State<Arc<AppState>>,
    Json(req): Json<StoreChunkRequest>,
) -> Result<Json<StoreChunkResponse>, ApiError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(&req.data)
        .map_err(|e| ApiError(CoreError::InvalidInput(format!("invalid base64 data: {e}"))))?;

    let outcome = app.store.store(&req.chunk_hash, &data)?;
    Ok(Json(StoreChunkResponse {
        status: match outcome {
            StoreOutcome::Stored => "stored",
            StoreOutcome::AlreadyPresent => "already_exists",
        },
        digest: req.chunk_hash.to_hex(),
        size_bytes: data.len(),
        node_id: app.node_id.clone(),
    }))
}

async fn retrieve_chunk(
    State(app): State<Arc<AppState>>,
    Path(digest): Path<Digest>,
) -> Result<Response, ApiError> {
    let data = app.store.retrieve(&digest)?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/octet-stream")
        .header(
            "X-Chunk-Hash",
            HeaderValue::from_str(&digest.to_hex()).expect("hex digest is valid header value"),
        )
        .body(Body::from(data))
        .expect("response with known-valid headers always builds");
    Ok(response)
}

async fn delete_chunk(
    State(app): State<Arc<AppState>>,
    Path(digest): Path<Digest>,
) -> Result<StatusCode, ApiError> {
    app.store.delete(&digest)?;
    Ok(StatusCode::OK)
}

async fn prove_chunk(
    State(app): State<Arc<AppState>>,
    Path(digest): Path<Digest>,
    Json(req): Json<ProveRequest>,
) -> Result<Json<ProveResponse>, ApiError> {
    let data = app.store.retrieve(&digest)?;
    let proof = store::generate_proof(&data, &req.challenge);
    Ok(Json(ProveResponse {
        digest: digest.to_hex(),
        challenge: req.challenge,
        proof,
        node_id: app.node_id.clone(),
    }))
}

async fn list_chunks(State(app): State<Arc<AppState>>) -> Result<Json<ChunkListResponse>, ApiError> {
    let chunks = app.store.list()?;
    let stats = app.store.stats()?;
    Ok(Json(ChunkListResponse {
        node_id: app.node_id.clone(),
        chunks,
        total_count: stats.count,
        total_size: stats.total_bytes,
    }))
}

async fn health(State(app): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let stats = app.store.stats()?;
    Ok(Json(HealthResponse {
        status: "healthy",
        service: "storage-node",
        node_id: app.node_id.clone(),
        stored_chunks: stats.count,
        total_size_bytes: stats.total_bytes,
    }))
}

async fn heartbeat_loop(
    tracker: TrackerClient,
    node_id: String,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = tracker.heartbeat(&node_id).await {
                    tracing::warn!(error = %e, "heartbeat failed");
                } else {
                    tracing::debug!("heartbeat sent");
                }
            }
            _ = shutdown.changed() => {
                tracing::info!("heartbeat loop stopping");
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = StorageNodeConfig::parse();
    let store = ChunkStore::open(&config.data_dir)?;
    let app_state = Arc::new(AppState {
        store,
        node_id: config.node_id.clone(),
    });

    let tracker = TrackerClient::new(&config.dht_tracker_url);
    match tracker.register(&config.node_id, &config.node_advertise_url).await {
        Ok(_) => tracing::info!(tracker = %config.dht_tracker_url, "registered with tracker"),
        Err(e) => tracing::error!(error = %e, "failed to register with tracker"),
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(heartbeat_loop(
        TrackerClient::new(&config.dht_tracker_url),
        config.node_id.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        shutdown_rx,
    ));

    let app = Router::new()
        .route("/chunks", post(store_chunk).get(list_chunks))
        .route("/chunks/:digest", get(retrieve_chunk).delete(delete_chunk))
        .route("/chunks/:digest/prove", post(prove_chunk))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, node_id = %config.node_id, data_dir = %config.data_dir, "storage node starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(chunkmesh::shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}
