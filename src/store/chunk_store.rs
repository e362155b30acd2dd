//! Content-addressed local store, one per storage peer. Chunks are
//! stored as files named by their digest, written atomically via a
//! temp-file-then-rename.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::hasher::{Digest, Hasher, Sha256Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub count: usize,
    pub total_bytes: u64,
}

/// A filesystem-backed, content-addressed chunk store.
pub struct ChunkStore {
    data_dir: PathBuf,
}

impl ChunkStore {
    /// Open (creating if necessary) a chunk store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .map_err(|e| CoreError::InvalidInput(format!("cannot create data dir: {e}")))?;
        info!(path = %data_dir.display(), "chunk store opened");
        Ok(Self { data_dir })
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        self.data_dir.join(digest.to_hex())
    }

    /// Store `bytes` under `digest`. Verifies the hash before
    /// writing; idempotent on a second call with the same digest.
    pub fn store(&self, digest: &Digest, bytes: &[u8]) -> Result<StoreOutcome, CoreError> {
        let path = self.path_for(digest);
        if path.exists() {
            debug!(digest = %digest, "chunk already present, skipping write");
            return Ok(StoreOutcome::AlreadyPresent);
        }

        let actual = Sha256Hasher.digest(bytes);
        if actual != *digest {
            warn!(expected = %digest, actual = %actual, "chunk digest mismatch on store");
            return Err(CoreError::DigestMismatch {
                expected: digest.to_hex(),
                actual: actual.to_hex(),
            });
        }

        let tmp_path = self.data_dir.join(format!("{}.tmp", digest.to_hex()));
        fs::write(&tmp_path, bytes)
            .map_err(|e| CoreError::InvalidInput(format!("write failed: {e}")))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| CoreError::InvalidInput(format!("rename failed: {e}")))?;

        info!(digest = %digest, bytes = bytes.len(), "chunk stored");
        Ok(StoreOutcome::Stored)
    }

    /// Retrieve the raw bytes stored under `digest`.
    pub fn retrieve(&self, digest: &Digest) -> Result<Vec<u8>, CoreError> {
        let path = self.path_for(digest);
        fs::read(&path).map_err(|_| CoreError::NotFound(digest.to_hex()))
    }

    /// Delete the blob stored under `digest`.
    pub fn delete(&self, digest: &Digest) -> Result<(), CoreError> {
        let path = self.path_for(digest);
        fs::remove_file(&path).map_err(|_| CoreError::NotFound(digest.to_hex()))?;
        info!(digest = %digest, "chunk deleted");
        Ok(())
    }

    pub fn exists(&self, digest: &Digest) -> bool {
        self.path_for(digest).exists()
    }

    /// List every digest currently stored.
    pub fn list(&self) -> Result<Vec<Digest>, CoreError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.data_dir)
            .map_err(|e| CoreError::InvalidInput(format!("cannot read data dir: {e}")))?
        {
            let entry = entry.map_err(|e| CoreError::InvalidInput(e.to_string()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".tmp") {
                continue;
            }
            if let Ok(digest) = name.parse::<Digest>() {
                out.push(digest);
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats, CoreError> {
        let digests = self.list()?;
        let mut total_bytes = 0u64;
        for d in &digests {
            let meta = fs::metadata(self.path_for(d))
                .map_err(|e| CoreError::InvalidInput(e.to_string()))?;
            total_bytes += meta.len();
        }
        Ok(StoreStats {
            count: digests.len(),
            total_bytes,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ChunkStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn store_and_retrieve_roundtrip() {
        let (store, _dir) = store();
        let data = b"some chunk bytes".to_vec();
        let digest = Sha256Hasher.digest(&data);

        assert_eq!(store.store(&digest, &data).unwrap(), StoreOutcome::Stored);
        let retrieved = store.retrieve(&digest).unwrap();
        assert_eq!(retrieved, data);
        assert_eq!(Sha256Hasher.digest(&retrieved), digest);
    }

    #[test]
    fn store_is_idempotent() {
        let (store, _dir) = store();
        let data = b"idempotent".to_vec();
        let digest = Sha256Hasher.digest(&data);

        assert_eq!(store.store(&digest, &data).unwrap(), StoreOutcome::Stored);
        assert_eq!(
            store.store(&digest, &data).unwrap(),
            StoreOutcome::AlreadyPresent
        );
    }

    #[test]
    fn store_rejects_digest_mismatch() {
        let (store, _dir) = store();
        let data = b"real data".to_vec();
        let wrong_digest = Sha256Hasher.digest(b"different data");

        assert!(matches!(
            store.store(&wrong_digest, &data),
            Err(CoreError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn retrieve_missing_is_not_found() {
        let (store, _dir) = store();
        let digest = Sha256Hasher.digest(b"never stored");
        assert!(matches!(
            store.retrieve(&digest),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_then_list_reflects_removal() {
        let (store, _dir) = store();
        let data = b"to be deleted".to_vec();
        let digest = Sha256Hasher.digest(&data);
        store.store(&digest, &data).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        store.delete(&digest).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.delete(&digest),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn stats_reports_count_and_bytes() {
        let (store, _dir) = store();
        let a = b"aaaa".to_vec();
        let b = b"bbbbbbbb".to_vec();
        store.store(&Sha256Hasher.digest(&a), &a).unwrap();
        store.store(&Sha256Hasher.digest(&b), &b).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_bytes, (a.len() + b.len()) as u64);
    }
}
