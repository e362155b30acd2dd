//! Metadata registry: the record of which files exist, their Merkle
//! root, and their chunk count. Treated as a black box by the rest of
//! the crate — a real deployment might back this with a ledger or
//! smart contract, so it is kept behind a trait and this crate ships
//! only an in-memory reference implementation.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hasher::Digest;

/// Everything needed to locate and verify a previously-uploaded file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileManifest {
    pub file_id: String,
    pub merkle_root: Digest,
    pub chunk_count: usize,
    pub filename: String,
    pub chunk_digests: Vec<Digest>,
    pub owner: String,
    pub timestamp: u64,
}

/// Abstract metadata registry. A real backend (ledger, smart
/// contract, database) can implement this without the rest of the
/// crate noticing.
pub trait MetadataRegistry: Send + Sync {
    fn publish(&self, manifest: FileManifest) -> Result<(), CoreError>;
    fn get(&self, file_id: &str) -> Result<FileManifest, CoreError>;
    fn count(&self) -> usize;
    fn id_by_index(&self, index: usize) -> Result<String, CoreError>;
}

/// In-process reference registry, insertion-ordered so `id_by_index`
/// behaves the way an on-chain array would.
#[derive(Default)]
pub struct InMemoryRegistry {
    entries: RwLock<Vec<FileManifest>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataRegistry for InMemoryRegistry {
    fn publish(&self, manifest: FileManifest) -> Result<(), CoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoreError::InvalidInput("registry lock poisoned".into()))?;
        if entries.iter().any(|m| m.file_id == manifest.file_id) {
            return Err(CoreError::InvalidInput(format!(
                "file id {} already registered",
                manifest.file_id
            )));
        }
        entries.push(manifest);
        Ok(())
    }

    fn get(&self, file_id: &str) -> Result<FileManifest, CoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoreError::InvalidInput("registry lock poisoned".into()))?;
        entries
            .iter()
            .find(|m| m.file_id == file_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(file_id.to_string()))
    }

    fn count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn id_by_index(&self, index: usize) -> Result<String, CoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoreError::InvalidInput("registry lock poisoned".into()))?;
        entries
            .get(index)
            .map(|m| m.file_id.clone())
            .ok_or_else(|| CoreError::NotFound(format!("no file at index {index}")))
    }
}
