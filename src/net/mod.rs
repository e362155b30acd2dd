//! HTTP clients the gateway and storage nodes use to talk to other
//! processes, plus the trait seams the replication manager and
//! download pipeline are written against so they never depend on
//! `reqwest` directly.

mod storage_client;
mod tracker_client;

pub use storage_client::StorageClient;
pub use tracker_client::TrackerClient;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::hasher::Digest;
use crate::peer_directory::PeerInfo;

/// Everything the replication manager and download pipeline need
/// from the peer directory, reached over the wire.
#[async_trait]
pub trait PeerSource: Send + Sync {
    async fn active_peers(&self) -> Result<Vec<PeerInfo>, CoreError>;
    async fn lookup_nearest(&self, target: &str, k: usize) -> Result<Vec<PeerInfo>, CoreError>;
    async fn locate(&self, digest: &Digest) -> Result<Vec<PeerInfo>, CoreError>;
    async fn announce(&self, digest: &Digest, peer_id: &str) -> Result<(), CoreError>;
}

/// Moving chunk bytes to and from a storage peer's own HTTP endpoint.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn store_chunk(&self, endpoint: &str, digest: &Digest, bytes: &[u8])
        -> Result<(), CoreError>;
    async fn fetch_chunk(&self, endpoint: &str, digest: &Digest) -> Result<Vec<u8>, CoreError>;
    async fn list_chunks(&self, endpoint: &str) -> Result<Vec<Digest>, CoreError>;
    async fn request_proof(&self, endpoint: &str, digest: &Digest, nonce: &str)
        -> Result<String, CoreError>;
}
