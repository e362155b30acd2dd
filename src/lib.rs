//! Core of a decentralized, content-addressed chunk storage engine:
//! a storage pipeline (chunk / encrypt / hash / Merkle-root), an
//! XOR-routed peer directory, a k-replica placement manager, and a
//! chunk store with proof-of-retrievability challenges.
//!
//! The three binaries in `src/bin/` (`tracker`, `storage-node`,
//! `gateway`) wire these modules to HTTP; everything in the library
//! itself is transport-agnostic.

pub mod chunk;
pub mod chunker;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod hasher;
pub mod merkle;
pub mod net;
pub mod peer_directory;
pub mod registry;
pub mod replication;
pub mod store;

pub use chunk::{Chunk, EncryptedChunk};
pub use error::CoreError;
pub use hasher::{Digest, Hasher, Sha256Hasher};
pub use merkle::{ChunkMerkleTree, MerkleProof, MerkleTree};

/// Types that can hand out a stable byte view of themselves — the
/// common seam the hasher and Merkle builder operate over.
pub trait AsBytes {
    fn as_bytes(&self) -> &[u8];
}

impl AsBytes for Digest {
    fn as_bytes(&self) -> &[u8] {
        self.as_raw()
    }
}

/// Render raw bytes as lowercase hex, the wire encoding used for
/// every digest in the system.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Parse a lowercase (or mixed-case) hex string back into bytes.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CoreError> {
    hex::decode(s).map_err(|e| CoreError::InvalidInput(format!("invalid hex: {e}")))
}

/// Seconds since the Unix epoch, used for last-seen and manifest
/// timestamps throughout the crate.
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs()
}

/// Resolves once an operator asks the process to stop (Ctrl+C, or
/// SIGTERM on Unix), for `axum::serve(..).with_graceful_shutdown(..)`
/// in each of the three binaries.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
