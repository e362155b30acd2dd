//! Per-chunk symmetric encryption: AES-256-CBC with PKCS#7 padding
//! and a random 16-byte IV prepended to the ciphertext. Wire format
//! (this is what the digest is taken over, since hashing happens
//! after encryption):
//!
//! ```text
//! bytes[0..16)  = random IV
//! bytes[16..)   = ciphertext (PKCS#7 padded plaintext)
//! ```

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ring::rand::{SecureRandom, SystemRandom};

use crate::chunk::{Chunk, EncryptedChunk};
use crate::error::CoreError;

pub const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Draw a fresh 256-bit key from a cryptographically secure source.
/// Each call is independent of every other.
pub fn generate_key() -> [u8; KEY_SIZE] {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_SIZE];
    rng.fill(&mut key).expect("system RNG must not fail");
    key
}

/// Encrypt a chunk under `key`. Fails with `InvalidKey` unless `key`
/// is exactly 32 bytes. A fresh random IV is drawn per call, so two
/// encryptions of the same plaintext under the same key never
/// produce the same blob.
pub fn encrypt(chunk: &Chunk, key: &[u8]) -> Result<EncryptedChunk, CoreError> {
    if key.len() != KEY_SIZE {
        return Err(CoreError::InvalidKey(format!(
            "key must be {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }

    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_SIZE];
    rng.fill(&mut iv).expect("system RNG must not fail");

    let encryptor = Aes256CbcEnc::new(key.into(), &iv.into());
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(&chunk.data);

    let mut bytes = Vec::with_capacity(IV_SIZE + ciphertext.len());
    bytes.extend_from_slice(&iv);
    bytes.extend_from_slice(&ciphertext);

    Ok(EncryptedChunk {
        bytes,
        index: chunk.index,
    })
}

/// Decrypt a blob produced by `encrypt` under the same `key`. Fails
/// with `InvalidKey` on bad key length, `DecryptionFailed` on any
/// length/padding mismatch (including a wrong key, which PKCS#7
/// padding validation will usually — not always — catch).
pub fn decrypt(blob: &EncryptedChunk, key: &[u8]) -> Result<Chunk, CoreError> {
    if key.len() != KEY_SIZE {
        return Err(CoreError::InvalidKey(format!(
            "key must be {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    if blob.bytes.len() < IV_SIZE + BLOCK_SIZE {
        return Err(CoreError::DecryptionFailed);
    }

    let (iv, ciphertext) = blob.bytes.split_at(IV_SIZE);
    let decryptor = Aes256CbcDec::new(key.into(), iv.into());

    let mut buf = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CoreError::DecryptionFailed)?;

    Ok(Chunk {
        data: plaintext.to_vec(),
        index: blob.index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &[u8]) -> Chunk {
        Chunk {
            data: data.to_vec(),
            index: 0,
        }
    }

    #[test]
    fn roundtrip() {
        let key = generate_key();
        let c = chunk(b"the quick brown fox jumps over the lazy dog");
        let enc = encrypt(&c, &key).unwrap();
        let dec = decrypt(&enc, &key).unwrap();
        assert_eq!(dec.data, c.data);
    }

    #[test]
    fn roundtrip_empty_and_block_aligned() {
        let key = generate_key();
        for len in [0usize, 1, 15, 16, 17, 256, 1024] {
            let data = vec![0xABu8; len];
            let c = chunk(&data);
            let enc = encrypt(&c, &key).unwrap();
            let dec = decrypt(&enc, &key).unwrap();
            assert_eq!(dec.data, data, "roundtrip failed for len {len}");
        }
    }

    #[test]
    fn same_plaintext_different_ciphertext() {
        let key = generate_key();
        let c = chunk(b"repeat me");
        let a = encrypt(&c, &key).unwrap();
        let b = encrypt(&c, &key).unwrap();
        assert_ne!(a.bytes, b.bytes);
    }

    #[test]
    fn wrong_key_fails_or_diverges() {
        let key_a = generate_key();
        let key_b = generate_key();
        let c = chunk(b"sensitive payload data that spans multiple AES blocks");
        let enc = encrypt(&c, &key_a).unwrap();

        match decrypt(&enc, &key_b) {
            Err(CoreError::DecryptionFailed) => {}
            Ok(wrong) => assert_ne!(wrong.data, c.data),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn rejects_bad_key_length() {
        let c = chunk(b"data");
        assert!(matches!(
            encrypt(&c, &[0u8; 16]),
            Err(CoreError::InvalidKey(_))
        ));
    }
}
