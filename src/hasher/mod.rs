mod sha256;

pub use sha256::{Digest, Sha256Hasher};

/// Content digest primitive. The Merkle builder and the chunk store
/// both depend on a single fixed hash function system-wide — SHA-256
/// is that function, `Sha256Hasher` its only implementation.
pub trait Hasher {
    type Hash;

    fn digest(&self, data: &[u8]) -> Self::Hash;
}
