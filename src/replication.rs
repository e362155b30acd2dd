//! The k-replica replication manager: places a chunk onto the
//! nearest peers, reports whether a chunk still meets its
//! replication factor, and repairs shortfalls by filling in peers
//! that do not already hold the chunk.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::CoreError;
use crate::hasher::Digest;
use crate::net::{ChunkTransport, PeerSource};

pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// Outcome of placing a chunk: who ended up with a copy, out of how
/// many candidates were tried.
#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub successful_peers: Vec<String>,
    pub attempted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationStatus {
    pub current: usize,
    pub meets_threshold: bool,
}

pub struct ReplicationManager {
    peers: Arc<dyn PeerSource>,
    transport: Arc<dyn ChunkTransport>,
    k: usize,
}

impl ReplicationManager {
    pub fn new(peers: Arc<dyn PeerSource>, transport: Arc<dyn ChunkTransport>, k: usize) -> Self {
        Self { peers, transport, k }
    }

    pub fn replication_factor(&self) -> usize {
        self.k
    }

    pub async fn locate(&self, digest: &Digest) -> Result<Vec<crate::peer_directory::PeerInfo>, CoreError> {
        self.peers.locate(digest).await
    }

    pub async fn active_peers(&self) -> Result<Vec<crate::peer_directory::PeerInfo>, CoreError> {
        self.peers.active_peers().await
    }

    /// Candidate peers for a chunk: the `k` nearest by XOR distance
    /// from the chunk's own digest, falling back to every active peer
    /// when the directory has fewer than `k` to offer.
    async fn candidates(&self, digest: &Digest) -> Result<Vec<crate::peer_directory::PeerInfo>, CoreError> {
        let nearest = self.peers.lookup_nearest(&digest.to_hex(), self.k).await?;
        if nearest.len() >= self.k {
            Ok(nearest)
        } else {
            self.peers.active_peers().await
        }
    }

    /// Distribute `bytes` (already encrypted) to up to `k` storage
    /// peers and announce each success to the directory. Fails with
    /// `NoReplicas` only if every attempt failed; a caller that
    /// requires full replication (e.g. an upload pipeline) must check
    /// `PlacementResult::successful_peers.len()` itself.
    pub async fn place(&self, digest: &Digest, bytes: &[u8]) -> Result<PlacementResult, CoreError> {
        let candidates = self.candidates(digest).await?;
        if candidates.is_empty() {
            return Err(CoreError::NoReplicas {
                digest: digest.to_hex(),
            });
        }

        let mut successful = Vec::new();
        for peer in candidates.iter().take(self.k) {
            match self.transport.store_chunk(&peer.endpoint, digest, bytes).await {
                Ok(()) => match self.peers.announce(digest, &peer.peer_id).await {
                    Ok(()) => {
                        info!(peer = %peer.peer_id, digest = %digest, "chunk placed");
                        successful.push(peer.peer_id.clone());
                    }
                    Err(e) => warn!(peer = %peer.peer_id, digest = %digest, error = %e, "announce failed after store"),
                },
                Err(e) => warn!(peer = %peer.peer_id, digest = %digest, error = %e, "store failed"),
            }
        }

        if successful.is_empty() {
            return Err(CoreError::NoReplicas {
                digest: digest.to_hex(),
            });
        }

        Ok(PlacementResult {
            successful_peers: successful,
            attempted: candidates.len().min(self.k),
        })
    }

    /// Current replica count for `digest` and whether it meets `k`.
    pub async fn assess(&self, digest: &Digest) -> Result<ReplicationStatus, CoreError> {
        let holders = self.peers.locate(digest).await?;
        let current = holders.len();
        Ok(ReplicationStatus {
            current,
            meets_threshold: current >= self.k,
        })
    }

    /// Fill the shortfall for `digest` using peers that do not
    /// already hold it. Returns the newly-added peer ids; empty if
    /// already at or above `k`.
    pub async fn repair(&self, digest: &Digest, bytes: &[u8]) -> Result<Vec<String>, CoreError> {
        let holders = self.peers.locate(digest).await?;
        let needed = self.k.saturating_sub(holders.len());
        if needed == 0 {
            return Ok(Vec::new());
        }

        let holder_ids: std::collections::HashSet<_> =
            holders.iter().map(|p| p.peer_id.clone()).collect();
        let all_active = self.peers.active_peers().await?;
        let candidates: Vec<_> = all_active
            .into_iter()
            .filter(|p| !holder_ids.contains(&p.peer_id))
            .take(needed)
            .collect();

        let mut repaired = Vec::new();
        for peer in candidates {
            match self.transport.store_chunk(&peer.endpoint, digest, bytes).await {
                Ok(()) => match self.peers.announce(digest, &peer.peer_id).await {
                    Ok(()) => {
                        info!(peer = %peer.peer_id, digest = %digest, "chunk repaired");
                        repaired.push(peer.peer_id);
                    }
                    Err(e) => warn!(peer = %peer.peer_id, error = %e, "announce failed during repair"),
                },
                Err(e) => warn!(peer = %peer.peer_id, error = %e, "store failed during repair"),
            }
        }
        Ok(repaired)
    }
}
