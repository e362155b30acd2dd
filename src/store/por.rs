//! Proof-of-retrievability challenge/response.
//!
//! A storage peer proves it still holds a chunk by hashing the
//! stored bytes together with a challenger-supplied nonce, without
//! transmitting the chunk itself: `H(data || nonce)`.

use crate::hasher::{Hasher, Sha256Hasher};

/// Compute the PoR response for `data` under `nonce`, as lowercase hex.
pub fn generate_proof(data: &[u8], nonce: &str) -> String {
    let mut buf = Vec::with_capacity(data.len() + nonce.len());
    buf.extend_from_slice(data);
    buf.extend_from_slice(nonce.as_bytes());
    Sha256Hasher.digest(&buf).to_hex()
}

/// Reference verifier: recomputes the proof locally (requires having
/// `data` on hand, i.e. an audit replica) and compares.
pub fn verify_proof(data: &[u8], nonce: &str, proof: &str) -> bool {
    generate_proof(data, nonce) == proof
}
