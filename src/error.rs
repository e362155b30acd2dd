use thiserror::Error;

/// The error taxonomy shared by every layer of the pipeline.
///
/// Each variant is a *kind*, not a wrapper around a lower-level error
/// type — transport failures against a single peer are recovered
/// locally (see `replication.rs`) and never reach this enum; only
/// failures that must propagate to a caller are represented here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown peer: {0}")]
    UnknownPeer(String),

    #[error("no replicas accepted chunk {digest}")]
    NoReplicas { digest: String },

    #[error("replication failed for chunk {digest}: {reason}")]
    ReplicationFailed { digest: String, reason: String },

    #[error("unretrievable: got {got} of {expected} chunks")]
    Unretrievable { got: usize, expected: usize },

    #[error("integrity check failed for chunk index {index}")]
    IntegrityFailed { index: usize },

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    TransportError(String),
}

impl CoreError {
    /// Stable kind string used as the wire-level error contract; the
    /// HTTP status is incidental, the kind is what callers should
    /// match on.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "InvalidInput",
            CoreError::InvalidKey(_) => "InvalidKey",
            CoreError::DigestMismatch { .. } => "DigestMismatch",
            CoreError::DecryptionFailed => "DecryptionFailed",
            CoreError::NotFound(_) => "NotFound",
            CoreError::UnknownPeer(_) => "UnknownPeer",
            CoreError::NoReplicas { .. } => "NoReplicas",
            CoreError::ReplicationFailed { .. } => "ReplicationFailed",
            CoreError::Unretrievable { .. } => "Unretrievable",
            CoreError::IntegrityFailed { .. } => "IntegrityFailed",
            CoreError::Timeout(_) => "Timeout",
            CoreError::TransportError(_) => "TransportError",
        }
    }

    /// Whether this error kind is a client-side mistake (4xx) as
    /// opposed to a fleet-side failure (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidInput(_)
                | CoreError::InvalidKey(_)
                | CoreError::NotFound(_)
                | CoreError::UnknownPeer(_)
                | CoreError::DecryptionFailed
        )
    }

    /// The HTTP status each binary's handlers map this kind onto.
    /// Kept here so the three services agree on one mapping instead
    /// of each guessing independently.
    pub fn http_status_code(&self) -> u16 {
        match self {
            CoreError::InvalidInput(_) | CoreError::InvalidKey(_) | CoreError::DecryptionFailed => 400,
            CoreError::NotFound(_) | CoreError::UnknownPeer(_) => 404,
            CoreError::DigestMismatch { .. } | CoreError::IntegrityFailed { .. } => 422,
            CoreError::Timeout(_) => 504,
            CoreError::NoReplicas { .. }
            | CoreError::ReplicationFailed { .. }
            | CoreError::Unretrievable { .. }
            | CoreError::TransportError(_) => 503,
        }
    }
}
