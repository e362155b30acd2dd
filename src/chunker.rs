//! Slices a byte stream into fixed-size frames and reassembles them
//! back in order.

use crate::chunk::Chunk;
use crate::error::CoreError;

/// Default chunk size: 256 KiB, matching the reference source.
pub const DEFAULT_CHUNK_SIZE: usize = 262_144;

/// Split `data` into an ordered sequence of chunks of at most `size`
/// bytes each. Every chunk except possibly the last has size exactly
/// `size`; the last has size in `[1, size]`.
pub fn split(data: &[u8], size: usize) -> Result<Vec<Chunk>, CoreError> {
    if size == 0 {
        return Err(CoreError::InvalidInput(
            "chunk size must be positive".into(),
        ));
    }
    if data.is_empty() {
        return Err(CoreError::InvalidInput("cannot split empty data".into()));
    }

    let chunks = data
        .chunks(size)
        .enumerate()
        .map(|(index, slice)| Chunk {
            data: slice.to_vec(),
            index,
        })
        .collect();

    Ok(chunks)
}

/// Reassemble chunks (already in index order) back into their
/// original byte sequence.
pub fn reassemble(chunks: &[Chunk]) -> Result<Vec<u8>, CoreError> {
    if chunks.is_empty() {
        return Err(CoreError::InvalidInput(
            "cannot reassemble from empty chunk list".into(),
        ));
    }

    let total: usize = chunks.iter().map(Chunk::len).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in chunks {
        out.extend_from_slice(&chunk.data);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_rejects_empty_input() {
        assert!(matches!(
            split(&[], 1024),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn split_rejects_zero_size() {
        assert!(matches!(
            split(b"abc", 0),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn split_preserves_order_and_sizes() {
        let data = vec![7u8; 6145]; // 7 chunks of 1024, last has 1 byte.
        let chunks = split(&data, 1024).unwrap();
        assert_eq!(chunks.len(), 7);
        for c in &chunks[..6] {
            assert_eq!(c.len(), 1024);
        }
        assert_eq!(chunks[6].len(), 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn roundtrip_single_chunk() {
        let data = b"Hello, World!".to_vec();
        let chunks = split(&data, 1024).unwrap();
        assert_eq!(chunks.len(), 1);
        let out = reassemble(&chunks).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_multi_chunk_arbitrary_sizes() {
        for size in [1usize, 13, 1024, 262_144] {
            let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
            let chunks = split(&data, size).unwrap();
            let out = reassemble(&chunks).unwrap();
            assert_eq!(out, data, "roundtrip failed for chunk size {size}");
        }
    }
}
