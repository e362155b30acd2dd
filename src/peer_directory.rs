//! The DHT-style peer directory: registration, heartbeat, eviction,
//! XOR-nearest lookup, and the chunk→peer index. Exactly one instance
//! lives per tracker process; it is the tracker's only shared mutable
//! state.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::hasher::{Digest, Hasher, Sha256Hasher};
use crate::now_unix;

/// Default staleness window, matching the reference `NODE_STALE_TIMEOUT`.
pub const DEFAULT_STALE_TIMEOUT_SECS: u64 = 60;

struct PeerRecord {
    endpoint: String,
    last_seen: u64,
    held_digests: HashSet<Digest>,
}

/// Public view of a peer, returned by every directory query and
/// serialized directly onto the tracker's HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: String,
    pub endpoint: String,
    pub last_seen: u64,
    pub chunk_count: usize,
}

/// XOR distance between two identifiers, each hashed first so
/// routing works over arbitrary human-readable ids. The 256-bit
/// result is compared as an unsigned big-endian integer, which is
/// exactly lexicographic byte comparison.
pub fn xor_distance(a: &str, b: &str) -> [u8; 32] {
    let ha = Sha256Hasher.digest(a.as_bytes());
    let hb = Sha256Hasher.digest(b.as_bytes());
    ha.xor_distance(&hb)
}

pub struct PeerDirectory {
    peers: DashMap<String, PeerRecord>,
    chunk_index: DashMap<Digest, HashSet<String>>,
    stale_timeout: Duration,
}

impl PeerDirectory {
    pub fn new(stale_timeout: Duration) -> Self {
        Self {
            peers: DashMap::new(),
            chunk_index: DashMap::new(),
            stale_timeout,
        }
    }

    /// Register a new peer, or update the endpoint and heartbeat of
    /// an existing one. A fresh registration of a previously-evicted
    /// peer-id re-enters as live with an empty chunk set.
    pub fn register(&self, peer_id: &str, endpoint: &str) -> PeerInfo {
        let now = now_unix();
        let mut entry = self.peers.entry(peer_id.to_string()).or_insert_with(|| {
            info!(peer_id, endpoint, "peer registered");
            PeerRecord {
                endpoint: endpoint.to_string(),
                last_seen: now,
                held_digests: HashSet::new(),
            }
        });
        entry.endpoint = endpoint.to_string();
        entry.last_seen = now;

        PeerInfo {
            peer_id: peer_id.to_string(),
            endpoint: entry.endpoint.clone(),
            last_seen: entry.last_seen,
            chunk_count: entry.held_digests.len(),
        }
    }

    /// Refresh a peer's last-seen timestamp. Fails with `UnknownPeer`
    /// if the peer has never registered (or was evicted).
    pub fn heartbeat(&self, peer_id: &str) -> Result<(), CoreError> {
        let mut entry = self
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| CoreError::UnknownPeer(peer_id.to_string()))?;
        entry.last_seen = now_unix();
        debug!(peer_id, "heartbeat");
        Ok(())
    }

    /// Record that `peer_id` holds `digest`. Fails with `UnknownPeer`
    /// if the peer is not registered.
    pub fn announce(&self, digest: Digest, peer_id: &str) -> Result<(), CoreError> {
        let mut entry = self
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| CoreError::UnknownPeer(peer_id.to_string()))?;
        entry.held_digests.insert(digest);
        drop(entry);

        self.chunk_index
            .entry(digest)
            .or_default()
            .insert(peer_id.to_string());

        debug!(peer_id, digest = %digest, "chunk announced");
        Ok(())
    }

    /// Remove peers that have not heartbeated within `stale_timeout`,
    /// cascading the removal into every chunk index entry and
    /// deleting entries that become empty.
    pub fn sweep(&self) -> Vec<String> {
        let now = now_unix();
        let stale: Vec<String> = self
            .peers
            .iter()
            .filter(|e| now.saturating_sub(e.last_seen) > self.stale_timeout.as_secs())
            .map(|e| e.key().clone())
            .collect();

        for peer_id in &stale {
            self.peers.remove(peer_id);
            let mut emptied = Vec::new();
            for mut entry in self.chunk_index.iter_mut() {
                entry.value_mut().remove(peer_id);
                if entry.value().is_empty() {
                    emptied.push(*entry.key());
                }
            }
            for digest in emptied {
                self.chunk_index.remove(&digest);
            }
            info!(peer_id, "peer evicted (stale)");
        }
        stale
    }

    fn peer_info(&self, peer_id: &str) -> Option<PeerInfo> {
        self.peers.get(peer_id).map(|e| PeerInfo {
            peer_id: peer_id.to_string(),
            endpoint: e.endpoint.clone(),
            last_seen: e.last_seen,
            chunk_count: e.held_digests.len(),
        })
    }

    /// All peers that have heartbeated within `stale_timeout`.
    pub fn active_peers(&self) -> Vec<PeerInfo> {
        self.sweep();
        self.peers
            .iter()
            .map(|e| PeerInfo {
                peer_id: e.key().clone(),
                endpoint: e.endpoint.clone(),
                last_seen: e.last_seen,
                chunk_count: e.held_digests.len(),
            })
            .collect()
    }

    /// Up to `k` active peers ordered by ascending XOR distance from
    /// `target`, ties broken lexicographically by peer-id.
    pub fn lookup_nearest(&self, target: &str, k: usize) -> Vec<PeerInfo> {
        self.sweep();
        let mut ranked: Vec<(PeerInfo, [u8; 32])> = self
            .peers
            .iter()
            .map(|e| {
                let info = PeerInfo {
                    peer_id: e.key().clone(),
                    endpoint: e.endpoint.clone(),
                    last_seen: e.last_seen,
                    chunk_count: e.held_digests.len(),
                };
                let dist = xor_distance(e.key(), target);
                (info, dist)
            })
            .collect();

        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.peer_id.cmp(&b.0.peer_id)));
        ranked.into_iter().take(k).map(|(info, _)| info).collect()
    }

    /// Active peers reporting they hold `digest`.
    pub fn locate(&self, digest: &Digest) -> Vec<PeerInfo> {
        self.sweep();
        let Some(holders) = self.chunk_index.get(digest) else {
            return Vec::new();
        };
        holders
            .iter()
            .filter_map(|peer_id| self.peer_info(peer_id))
            .collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn tracked_chunk_count(&self) -> usize {
        self.chunk_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn digest(s: &str) -> Digest {
        Sha256Hasher.digest(s.as_bytes())
    }

    #[test]
    fn register_then_heartbeat_updates_timestamp() {
        let dir = PeerDirectory::new(Duration::from_secs(60));
        let info = dir.register("peer-a", "http://a:9000");
        assert_eq!(info.chunk_count, 0);
        dir.heartbeat("peer-a").unwrap();
        assert!(dir.heartbeat("unknown").is_err());
    }

    #[test]
    fn announce_requires_registered_peer() {
        let dir = PeerDirectory::new(Duration::from_secs(60));
        let d = digest("chunk");
        assert!(matches!(
            dir.announce(d, "ghost"),
            Err(CoreError::UnknownPeer(_))
        ));

        dir.register("peer-a", "http://a:9000");
        dir.announce(d, "peer-a").unwrap();
        let holders = dir.locate(&d);
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].peer_id, "peer-a");
    }

    #[test]
    fn stale_peer_is_evicted_and_cascades() {
        let dir = PeerDirectory::new(Duration::from_secs(0));
        dir.register("peer-a", "http://a:9000");
        let d = digest("chunk");
        dir.announce(d, "peer-a").unwrap();

        // stale_timeout of 0 means anything not heartbeated *this
        // instant* is already stale on the next sweep.
        std::thread::sleep(Duration::from_secs(1));
        let evicted = dir.sweep();
        assert_eq!(evicted, vec!["peer-a".to_string()]);
        assert!(dir.active_peers().is_empty());
        assert!(dir.locate(&d).is_empty());
        assert_eq!(dir.tracked_chunk_count(), 0);
    }

    #[test]
    fn reregistering_evicted_peer_restores_empty_chunk_set() {
        let dir = PeerDirectory::new(Duration::from_secs(0));
        dir.register("peer-a", "http://a:9000");
        dir.announce(digest("chunk"), "peer-a").unwrap();
        std::thread::sleep(Duration::from_secs(1));
        dir.sweep();

        let info = dir.register("peer-a", "http://a:9001");
        assert_eq!(info.chunk_count, 0);
        assert_eq!(dir.active_peers().len(), 1);
    }

    #[test]
    fn lookup_nearest_is_ordered_by_xor_distance_with_tiebreak() {
        let dir = PeerDirectory::new(Duration::from_secs(60));
        for id in ["peer-a", "peer-b", "peer-c", "peer-d"] {
            dir.register(id, "http://x");
        }

        let nearest = dir.lookup_nearest("some-target", 2);
        assert_eq!(nearest.len(), 2);

        let mut expected: Vec<(String, [u8; 32])> = ["peer-a", "peer-b", "peer-c", "peer-d"]
            .iter()
            .map(|id| (id.to_string(), xor_distance(id, "some-target")))
            .collect();
        expected.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        assert_eq!(nearest[0].peer_id, expected[0].0);
        assert_eq!(nearest[1].peer_id, expected[1].0);
    }

    #[test]
    fn lookup_nearest_falls_back_to_fewer_than_k_when_sparse() {
        let dir = PeerDirectory::new(Duration::from_secs(60));
        dir.register("only-peer", "http://x");
        let nearest = dir.lookup_nearest("target", 5);
        assert_eq!(nearest.len(), 1);
    }
}
