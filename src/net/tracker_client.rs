use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hasher::Digest;
use crate::peer_directory::PeerInfo;

use super::PeerSource;

/// Control-plane timeout, matching spec §5's reference value for
/// registration/heartbeat/lookup calls against the tracker.
const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(10);

fn map_send_err(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::Timeout(e.to_string())
    } else {
        CoreError::TransportError(e.to_string())
    }
}

#[derive(Serialize)]
struct AnnounceRequest<'a> {
    chunk_hash: &'a Digest,
    peer_id: &'a str,
}

#[derive(Deserialize)]
struct ChunkLocationsResponse {
    nodes: Vec<PeerInfo>,
}

/// Thin HTTP client for the tracker's peer-directory API.
pub struct TrackerClient {
    base_url: String,
    http: reqwest::Client,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(CONTROL_PLANE_TIMEOUT)
                .build()
                .expect("reqwest client config is always valid"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Register this process with the tracker. Not part of
    /// `PeerSource` since it's only ever called by storage peers
    /// about themselves, not by consumers locating others.
    pub async fn register(&self, peer_id: &str, endpoint: &str) -> Result<PeerInfo, CoreError> {
        #[derive(Serialize)]
        struct Body<'a> {
            peer_id: &'a str,
            endpoint: &'a str,
        }
        self.http
            .post(self.url("/nodes/register"))
            .json(&Body { peer_id, endpoint })
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<PeerInfo>()
            .await
            .map_err(map_send_err)
    }

    pub async fn heartbeat(&self, peer_id: &str) -> Result<(), CoreError> {
        #[derive(Serialize)]
        struct Body<'a> {
            peer_id: &'a str,
        }
        self.http
            .post(self.url("/nodes/heartbeat"))
            .json(&Body { peer_id })
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?;
        Ok(())
    }
}

#[async_trait]
impl PeerSource for TrackerClient {
    async fn active_peers(&self) -> Result<Vec<PeerInfo>, CoreError> {
        self.http
            .get(self.url("/nodes"))
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<Vec<PeerInfo>>()
            .await
            .map_err(map_send_err)
    }

    async fn lookup_nearest(&self, target: &str, k: usize) -> Result<Vec<PeerInfo>, CoreError> {
        self.http
            .get(self.url("/nodes/closest"))
            .query(&[("target_hash", target), ("k", &k.to_string())])
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<Vec<PeerInfo>>()
            .await
            .map_err(map_send_err)
    }

    async fn locate(&self, digest: &Digest) -> Result<Vec<PeerInfo>, CoreError> {
        let resp = self
            .http
            .get(self.url(&format!("/chunks/{}/locations", digest.to_hex())))
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?
            .json::<ChunkLocationsResponse>()
            .await
            .map_err(map_send_err)?;
        Ok(resp.nodes)
    }

    async fn announce(&self, digest: &Digest, peer_id: &str) -> Result<(), CoreError> {
        self.http
            .post(self.url("/chunks/announce"))
            .json(&AnnounceRequest {
                chunk_hash: digest,
                peer_id,
            })
            .send()
            .await
            .map_err(map_send_err)?
            .error_for_status()
            .map_err(map_send_err)?;
        Ok(())
    }
}
