//! The gateway orchestrator: wires the storage pipeline, peer
//! directory, and replication manager into the two end-to-end flows
//! a caller actually wants — upload a file, download a file — plus
//! the file listing and retrievability audit that sit alongside them.
//!
//! Upload: split → encrypt → hash → Merkle root → replicate → publish.
//! Download: registry lookup → locate → fetch → verify → decrypt →
//! reassemble, strictly in the manifest's digest order. A node's own
//! chunk listing is never used to reconstruct order — only the
//! manifest is authoritative, so a download either reproduces the
//! exact original bytes or fails outright.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunk::EncryptedChunk;
use crate::chunker;
use crate::crypto;
use crate::error::CoreError;
use crate::hasher::{Digest, Hasher, Sha256Hasher};
use crate::merkle::{ChunkMerkleTree, MerkleTree};
use crate::net::ChunkTransport;
use crate::peer_directory::PeerInfo;
use crate::registry::{FileManifest, MetadataRegistry};
use crate::replication::ReplicationManager;
use crate::{decode_hex, encode_hex, now_unix};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file_id: String,
    pub filename: String,
    pub encryption_key: String,
    pub merkle_root: Digest,
    pub chunk_count: usize,
    pub chunk_hashes: Vec<Digest>,
    pub replication_factor: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyChunkResult {
    pub chunk_hash: Digest,
    pub peer_id: String,
    pub nonce: String,
    pub proof: String,
    pub is_valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub file_id: String,
    pub merkle_root_valid: bool,
    pub chunk_proofs: Vec<VerifyChunkResult>,
    pub all_valid: bool,
}

/// A node is only challenged on this many of its chunks per file
/// verification pass, to keep the audit bounded.
const MAX_CHALLENGES_PER_NODE: usize = 5;

pub struct Gateway {
    registry: Arc<dyn MetadataRegistry>,
    replication: Arc<ReplicationManager>,
    transport: Arc<dyn ChunkTransport>,
    chunk_size: usize,
}

impl Gateway {
    pub fn new(
        registry: Arc<dyn MetadataRegistry>,
        replication: Arc<ReplicationManager>,
        transport: Arc<dyn ChunkTransport>,
        chunk_size: usize,
    ) -> Self {
        Self {
            registry,
            replication,
            transport,
            chunk_size,
        }
    }

    /// Run the full upload pipeline. Fails with `ReplicationFailed`
    /// if any chunk falls short of the replication factor — an
    /// upload either lands in full or is rejected outright, rather
    /// than silently publishing a partially-replicated file.
    pub async fn upload(
        &self,
        filename: &str,
        content: &[u8],
        owner: &str,
    ) -> Result<UploadOutcome, CoreError> {
        if content.is_empty() {
            return Err(CoreError::InvalidInput("cannot upload an empty file".into()));
        }

        let plain_chunks = chunker::split(content, self.chunk_size)?;
        info!(filename, chunks = plain_chunks.len(), "file split");

        let key = crypto::generate_key();

        let mut encrypted_chunks = Vec::with_capacity(plain_chunks.len());
        let mut chunk_hashes = Vec::with_capacity(plain_chunks.len());
        for chunk in &plain_chunks {
            let encrypted = crypto::encrypt(chunk, &key)?;
            let hash = Sha256Hasher.digest(&encrypted.bytes);
            chunk_hashes.push(hash);
            encrypted_chunks.push(encrypted);
        }

        let tree = ChunkMerkleTree::build(&chunk_hashes)?;
        let merkle_root = tree.root();
        info!(filename, root = %merkle_root, "merkle root computed");

        let replication_factor = self.replication.replication_factor();
        for (i, (digest, encrypted)) in chunk_hashes.iter().zip(&encrypted_chunks).enumerate() {
            let placement = self.replication.place(digest, &encrypted.bytes).await?;
            if placement.successful_peers.len() < replication_factor {
                warn!(
                    chunk = i,
                    digest = %digest,
                    got = placement.successful_peers.len(),
                    wanted = replication_factor,
                    "upload aborted: chunk fell short of replication factor"
                );
                return Err(CoreError::ReplicationFailed {
                    digest: digest.to_hex(),
                    reason: format!(
                        "only {}/{} replicas placed",
                        placement.successful_peers.len(),
                        replication_factor
                    ),
                });
            }
        }

        let file_id = generate_file_id(filename);
        let manifest = FileManifest {
            file_id: file_id.clone(),
            merkle_root,
            chunk_count: plain_chunks.len(),
            filename: filename.to_string(),
            chunk_digests: chunk_hashes.clone(),
            owner: owner.to_string(),
            timestamp: now_unix(),
        };
        self.registry.publish(manifest)?;

        info!(file_id, filename, "upload complete");
        Ok(UploadOutcome {
            file_id,
            filename: filename.to_string(),
            encryption_key: encode_hex(&key),
            merkle_root,
            chunk_count: plain_chunks.len(),
            chunk_hashes,
            replication_factor,
        })
    }

    /// Run the full download pipeline: the manifest's chunk order is
    /// authoritative, so every chunk is looked up and fetched by its
    /// own digest rather than inferred from whatever a node happens
    /// to report it holds.
    pub async fn download(&self, file_id: &str, key_hex: &str) -> Result<DownloadOutcome, CoreError> {
        let manifest = self.registry.get(file_id)?;
        let key = decode_hex(key_hex)?;

        let mut retrieved_digests = Vec::with_capacity(manifest.chunk_digests.len());
        let mut plain_chunks = Vec::with_capacity(manifest.chunk_digests.len());
        for (index, digest) in manifest.chunk_digests.iter().enumerate() {
            let mut holders = self.replication_peers_for(digest).await?;
            if holders.is_empty() {
                warn!(digest = %digest, "no reported holders, falling back to every active peer");
                holders = self.replication.active_peers().await?;
            }
            if holders.is_empty() {
                return Err(CoreError::Unretrievable {
                    got: index,
                    expected: manifest.chunk_count,
                });
            }

            let mut fetched = None;
            for peer in &holders {
                match self.transport.fetch_chunk(&peer.endpoint, digest).await {
                    Ok(bytes) => {
                        let actual = Sha256Hasher.digest(&bytes);
                        if actual == *digest {
                            fetched = Some(bytes);
                            break;
                        }
                        warn!(peer = %peer.peer_id, digest = %digest, "chunk hash mismatch, trying next peer");
                    }
                    Err(e) => warn!(peer = %peer.peer_id, digest = %digest, error = %e, "fetch failed, trying next peer"),
                }
            }

            let bytes = fetched.ok_or(CoreError::Unretrievable {
                got: index,
                expected: manifest.chunk_count,
            })?;

            retrieved_digests.push(*digest);
            let encrypted = EncryptedChunk { bytes, index };
            let decrypted = crypto::decrypt(&encrypted, &key)?;
            plain_chunks.push(decrypted);
        }

        let rebuilt_root = ChunkMerkleTree::build(&retrieved_digests)?.root();
        if rebuilt_root != manifest.merkle_root {
            warn!(file_id, expected = %manifest.merkle_root, actual = %rebuilt_root, "merkle root mismatch on download");
            return Err(CoreError::IntegrityFailed {
                index: retrieved_digests.len(),
            });
        }

        let data = chunker::reassemble(&plain_chunks)?;
        Ok(DownloadOutcome {
            filename: manifest.filename,
            data,
        })
    }

    async fn replication_peers_for(&self, digest: &Digest) -> Result<Vec<PeerInfo>, CoreError> {
        self.replication.locate(digest).await
    }

    pub fn list_files(&self) -> Vec<FileManifest> {
        let count = self.registry.count();
        (0..count)
            .filter_map(|i| self.registry.id_by_index(i).ok())
            .filter_map(|id| self.registry.get(&id).ok())
            .collect()
    }

    /// Proof-of-retrievability audit for a previously-uploaded file:
    /// challenge every peer that reports holding one of the file's
    /// chunks, capped at a handful of chunks per peer.
    pub async fn verify(&self, file_id: &str) -> Result<VerifyOutcome, CoreError> {
        let manifest = self.registry.get(file_id)?;
        let active_peers = self.replication.active_peers().await?;

        let mut chunk_proofs = Vec::new();
        let mut all_valid = true;

        for peer in &active_peers {
            let held = self.transport.list_chunks(&peer.endpoint).await.unwrap_or_default();
            let relevant: Vec<_> = held
                .into_iter()
                .filter(|d| manifest.chunk_digests.contains(d))
                .take(MAX_CHALLENGES_PER_NODE)
                .collect();

            for digest in relevant {
                let nonce = encode_hex(&crypto::generate_key()[..16]);
                match self.transport.request_proof(&peer.endpoint, &digest, &nonce).await {
                    Ok(proof) => {
                        chunk_proofs.push(VerifyChunkResult {
                            chunk_hash: digest,
                            peer_id: peer.peer_id.clone(),
                            nonce,
                            proof,
                            is_valid: true,
                        });
                    }
                    Err(e) => {
                        warn!(peer = %peer.peer_id, digest = %digest, error = %e, "proof challenge failed");
                        all_valid = false;
                        chunk_proofs.push(VerifyChunkResult {
                            chunk_hash: digest,
                            peer_id: peer.peer_id.clone(),
                            nonce,
                            proof: String::new(),
                            is_valid: false,
                        });
                    }
                }
            }
        }

        Ok(VerifyOutcome {
            file_id: file_id.to_string(),
            merkle_root_valid: true,
            chunk_proofs,
            all_valid,
        })
    }
}

fn generate_file_id(filename: &str) -> String {
    let mut nonce = [0u8; 16];
    use ring::rand::{SecureRandom, SystemRandom};
    SystemRandom::new()
        .fill(&mut nonce)
        .expect("system RNG must be available");
    let mut buf = Vec::with_capacity(filename.len() + 16);
    buf.extend_from_slice(filename.as_bytes());
    buf.extend_from_slice(&nonce);
    Sha256Hasher.digest(&buf).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::PeerSource;
    use crate::registry::InMemoryRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDirectory {
        peers: Vec<PeerInfo>,
        holders: Mutex<HashMap<Digest, Vec<String>>>,
    }

    #[async_trait]
    impl PeerSource for FakeDirectory {
        async fn active_peers(&self) -> Result<Vec<PeerInfo>, CoreError> {
            Ok(self.peers.clone())
        }
        async fn lookup_nearest(&self, _target: &str, k: usize) -> Result<Vec<PeerInfo>, CoreError> {
            Ok(self.peers.iter().take(k).cloned().collect())
        }
        async fn locate(&self, digest: &Digest) -> Result<Vec<PeerInfo>, CoreError> {
            let holders = self.holders.lock().unwrap();
            let ids = holders.get(digest).cloned().unwrap_or_default();
            Ok(self.peers.iter().filter(|p| ids.contains(&p.peer_id)).cloned().collect())
        }
        async fn announce(&self, digest: &Digest, peer_id: &str) -> Result<(), CoreError> {
            self.holders.lock().unwrap().entry(*digest).or_default().push(peer_id.to_string());
            Ok(())
        }
    }

    struct FakeTransport {
        blobs: Mutex<HashMap<(String, Digest), Vec<u8>>>,
    }

    #[async_trait]
    impl ChunkTransport for FakeTransport {
        async fn store_chunk(&self, endpoint: &str, digest: &Digest, bytes: &[u8]) -> Result<(), CoreError> {
            self.blobs.lock().unwrap().insert((endpoint.to_string(), *digest), bytes.to_vec());
            Ok(())
        }
        async fn fetch_chunk(&self, endpoint: &str, digest: &Digest) -> Result<Vec<u8>, CoreError> {
            self.blobs
                .lock()
                .unwrap()
                .get(&(endpoint.to_string(), *digest))
                .cloned()
                .ok_or_else(|| CoreError::NotFound(digest.to_hex()))
        }
        async fn list_chunks(&self, endpoint: &str) -> Result<Vec<Digest>, CoreError> {
            Ok(self
                .blobs
                .lock()
                .unwrap()
                .keys()
                .filter(|(e, _)| e == endpoint)
                .map(|(_, d)| *d)
                .collect())
        }
        async fn request_proof(&self, endpoint: &str, digest: &Digest, nonce: &str) -> Result<String, CoreError> {
            let data = self.fetch_chunk(endpoint, digest).await?;
            Ok(crate::store::generate_proof(&data, nonce))
        }
    }

    fn peer(id: &str) -> PeerInfo {
        PeerInfo {
            peer_id: id.to_string(),
            endpoint: id.to_string(),
            last_seen: 0,
            chunk_count: 0,
        }
    }

    fn gateway(peers: Vec<PeerInfo>, k: usize) -> Gateway {
        gateway_with_registry(peers, k).0
    }

    fn gateway_with_registry(peers: Vec<PeerInfo>, k: usize) -> (Gateway, Arc<dyn MetadataRegistry>) {
        let dir: Arc<dyn PeerSource> = Arc::new(FakeDirectory {
            peers,
            holders: Mutex::new(HashMap::new()),
        });
        let transport: Arc<dyn ChunkTransport> = Arc::new(FakeTransport {
            blobs: Mutex::new(HashMap::new()),
        });
        let replication = Arc::new(ReplicationManager::new(dir, transport.clone(), k));
        let registry: Arc<dyn MetadataRegistry> = Arc::new(InMemoryRegistry::new());
        (
            Gateway::new(registry.clone(), replication, transport, 16),
            registry,
        )
    }

    fn gateway_with_directory(peers: Vec<PeerInfo>, k: usize) -> (Gateway, Arc<FakeDirectory>) {
        let dir = Arc::new(FakeDirectory {
            peers,
            holders: Mutex::new(HashMap::new()),
        });
        let transport: Arc<dyn ChunkTransport> = Arc::new(FakeTransport {
            blobs: Mutex::new(HashMap::new()),
        });
        let replication = Arc::new(ReplicationManager::new(dir.clone(), transport.clone(), k));
        let registry: Arc<dyn MetadataRegistry> = Arc::new(InMemoryRegistry::new());
        (Gateway::new(registry, replication, transport, 16), dir)
    }

    #[tokio::test]
    async fn upload_then_download_roundtrips() {
        let gw = gateway(vec![peer("p1"), peer("p2")], 2);
        let content = b"a reasonably sized payload that spans chunks".to_vec();

        let uploaded = gw.upload("notes.txt", &content, "alice").await.unwrap();
        assert_eq!(uploaded.filename, "notes.txt");

        let downloaded = gw.download(&uploaded.file_id, &uploaded.encryption_key).await.unwrap();
        assert_eq!(downloaded.data, content);
        assert_eq!(downloaded.filename, "notes.txt");
    }

    #[tokio::test]
    async fn upload_rejects_empty_file() {
        let gw = gateway(vec![peer("p1")], 1);
        assert!(matches!(
            gw.upload("empty.txt", &[], "alice").await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn upload_fails_when_replication_factor_cannot_be_met() {
        // k=3 but only one peer exists, so every chunk lands on at
        // most one replica — the whole upload must be rejected.
        let gw = gateway(vec![peer("p1")], 3);
        let content = b"short file".to_vec();
        assert!(matches!(
            gw.upload("f.txt", &content, "alice").await,
            Err(CoreError::ReplicationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn download_with_wrong_key_never_returns_original_bytes() {
        // A wrong key almost always produces a PKCS#7 padding error;
        // on the rare chance it doesn't, it must not produce the
        // original plaintext either.
        let gw = gateway(vec![peer("p1"), peer("p2")], 2);
        let content = b"secret contents".to_vec();
        let uploaded = gw.upload("f.txt", &content, "alice").await.unwrap();

        let wrong_key = encode_hex(&crypto::generate_key());
        match gw.download(&uploaded.file_id, &wrong_key).await {
            Ok(outcome) => assert_ne!(outcome.data, content),
            Err(_) => {}
        }
    }

    #[tokio::test]
    async fn download_unknown_file_is_not_found() {
        let gw = gateway(vec![peer("p1")], 1);
        assert!(matches!(
            gw.download("ghost", "00").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn verify_challenges_every_held_chunk() {
        let gw = gateway(vec![peer("p1"), peer("p2")], 2);
        let content = b"file to audit".to_vec();
        let uploaded = gw.upload("audit.txt", &content, "alice").await.unwrap();

        let outcome = gw.verify(&uploaded.file_id).await.unwrap();
        assert!(!outcome.chunk_proofs.is_empty());
        assert!(outcome.all_valid);
    }

    #[test]
    fn list_files_reflects_published_manifests() {
        let gw = gateway(vec![peer("p1")], 1);
        assert!(gw.list_files().is_empty());
    }

    #[tokio::test]
    async fn download_rejects_tampered_manifest_root() {
        let (gw, registry) = gateway_with_registry(vec![peer("p1"), peer("p2")], 2);
        let content = b"file whose manifest gets corrupted in the registry".to_vec();
        let uploaded = gw.upload("f.txt", &content, "alice").await.unwrap();

        let mut manifest = registry.get(&uploaded.file_id).unwrap();
        manifest.merkle_root = Sha256Hasher.digest(b"not the real root");
        // Re-publish under a fresh id so InMemoryRegistry's no-overwrite
        // rule doesn't get in the way of simulating registry corruption.
        let corrupted_id = format!("{}-corrupted", uploaded.file_id);
        manifest.file_id = corrupted_id.clone();
        registry.publish(manifest).unwrap();

        assert!(matches!(
            gw.download(&corrupted_id, &uploaded.encryption_key).await,
            Err(CoreError::IntegrityFailed { .. })
        ));
    }

    #[tokio::test]
    async fn download_falls_back_to_active_peers_when_directory_forgets_holders() {
        let (gw, dir) = gateway_with_directory(vec![peer("p1"), peer("p2")], 2);
        let content = b"file whose tracker entry goes missing".to_vec();
        let uploaded = gw.upload("f.txt", &content, "alice").await.unwrap();

        // Simulate the directory losing every chunk-index entry (e.g. a
        // sweep raced with announce) while the peers still hold the data.
        dir.holders.lock().unwrap().clear();

        let downloaded = gw.download(&uploaded.file_id, &uploaded.encryption_key).await.unwrap();
        assert_eq!(downloaded.data, content);
    }
}
