use serde::Serializer;

use crate::AsBytes;

/// A contiguous slice of file plaintext. Exists only transiently in
/// memory during upload/download — nothing persists a `Chunk`
/// directly, only its encrypted form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    pub index: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsBytes for Chunk {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl serde::Serialize for Chunk {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use base64::Engine;
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.data))
    }
}

/// The ciphertext of a `Chunk` under the file key, self-contained —
/// it carries its own IV. Treated as an opaque blob by everything
/// except `crypto.rs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub bytes: Vec<u8>,
    pub index: usize,
}

impl AsBytes for EncryptedChunk {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl serde::Serialize for EncryptedChunk {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use base64::Engine;
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.bytes))
    }
}
