use std::fmt;
use std::str::FromStr;

use ring::digest;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::AsBytes;

use super::Hasher;

/// 256-bit content digest, always rendered as 64-character lowercase
/// hex in every interface.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn from_raw(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 256-bit unsigned XOR distance between two digests, used by
    /// the peer directory's nearest-neighbor routing.
    pub fn xor_distance(&self, other: &Digest) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..32 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::InvalidInput(format!("invalid digest hex: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidInput("digest must be 32 bytes".into()))?;
        Ok(Digest(arr))
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AsBytes for Digest {
    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-256-backed `Hasher`, the hash function fixed system-wide.
#[derive(Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    type Hash = Digest;

    fn digest(&self, data: &[u8]) -> Digest {
        let d = digest::digest(&digest::SHA256, data);
        Digest(d.as_ref().try_into().expect("SHA-256 is always 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_hex_roundtrip() {
        let hasher = Sha256Hasher;
        let d = hasher.digest(b"hello world");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 64);
        let parsed: Digest = hex.parse().unwrap();
        assert_eq!(parsed, d);
    }

    #[test]
    fn digest_is_deterministic() {
        let hasher = Sha256Hasher;
        assert_eq!(hasher.digest(b"abc"), hasher.digest(b"abc"));
        assert_ne!(hasher.digest(b"abc"), hasher.digest(b"abd"));
    }

    #[test]
    fn xor_distance_zero_for_equal_digests() {
        let hasher = Sha256Hasher;
        let d = hasher.digest(b"same");
        assert_eq!(d.xor_distance(&d), [0u8; 32]);
    }
}
