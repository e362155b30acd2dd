use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hasher::Digest;

use super::ChunkTransport;

/// Chunk-transfer timeout, matching spec §5's reference value for
/// blob store/fetch calls against a storage peer.
const CHUNK_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

fn map_send_err(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::Timeout(e.to_string())
    } else {
        CoreError::TransportError(e.to_string())
    }
}

#[derive(Serialize)]
struct StoreRequest<'a> {
    chunk_hash: &'a Digest,
    data: String,
}

#[derive(Serialize)]
struct ProveRequest<'a> {
    challenge: &'a str,
}

#[derive(Deserialize)]
pub struct ProveResponse {
    pub proof: String,
}

#[derive(Deserialize)]
struct ListChunksResponse {
    chunks: Vec<Digest>,
}

/// Thin HTTP client for a storage peer's chunk and proof-of-retrievability API.
pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(CHUNK_TRANSFER_TIMEOUT)
                .build()
                .expect("reqwest client config is always valid"),
        }
    }

    fn url(endpoint: &str, path: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), path)
    }
}

impl Default for StorageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkTransport for StorageClient {
    async fn store_chunk(
        &self,
        endpoint: &str,
        digest: &Digest,
        bytes: &[u8],
    ) -> Result<(), CoreError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.http
            .post(Self::url(endpoint, "/chunks"))
            .json(&StoreRequest {
                chunk_hash: digest,
                data: encoded,
            })
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?;
        Ok(())
    }

    async fn fetch_chunk(&self, endpoint: &str, digest: &Digest) -> Result<Vec<u8>, CoreError> {
        let resp = self
            .http
            .get(Self::url(endpoint, &format!("/chunks/{}", digest.to_hex())))
            .send()
            .await
            .map_err(map_send_err)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CoreError::NotFound(digest.to_hex()));
        }
        let resp = resp.error_for_status().map_err(map_send_err)?;

        resp.bytes().await.map(|b| b.to_vec()).map_err(map_send_err)
    }

    async fn list_chunks(&self, endpoint: &str) -> Result<Vec<Digest>, CoreError> {
        let resp = self
            .http
            .get(Self::url(endpoint, "/chunks"))
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<ListChunksResponse>()
            .await
            .map_err(map_send_err)?;
        Ok(resp.chunks)
    }

    async fn request_proof(
        &self,
        endpoint: &str,
        digest: &Digest,
        nonce: &str,
    ) -> Result<String, CoreError> {
        let resp = self
            .http
            .post(Self::url(
                endpoint,
                &format!("/chunks/{}/prove", digest.to_hex()),
            ))
            .json(&ProveRequest { challenge: nonce })
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<ProveResponse>()
            .await
            .map_err(map_send_err)?;
        Ok(resp.proof)
    }
}
