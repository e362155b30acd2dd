//! Balanced binary Merkle tree over chunk digests.
//!
//! Construction differs from a textbook power-of-two tree: when a
//! level has an odd node count, the last node is paired with itself
//! to form its parent, rather than padding the level out to the next
//! power of two. This means tree levels can have arbitrary sizes, so
//! the tree is stored level-by-level rather than as one flat array.

use crate::error::CoreError;
use crate::hasher::{Digest, Hasher, Sha256Hasher};
use crate::AsBytes;

/// Which side of its parent a proof step's sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One step of an authentication path: the sibling digest and which
/// side of the (implicit) current node it sits on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling: Digest,
    pub side: Side,
}

pub type MerkleProof = Vec<ProofStep>;

fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    Sha256Hasher.digest(&buf)
}

/// A balanced binary Merkle tree built over an ordered list of chunk
/// digests, with odd levels duplicating their last node.
#[derive(Clone, Debug)]
pub struct ChunkMerkleTree {
    /// `levels[0]` are the leaves, `levels.last()` is `[root]`.
    levels: Vec<Vec<Digest>>,
}

/// Generic contract the tree builder satisfies, kept as a trait so
/// alternate tree shapes can be swapped in for testing without
/// touching callers.
pub trait MerkleTree {
    fn root(&self) -> Digest;
    fn prove(&self, index: usize) -> Result<MerkleProof, CoreError>;
}

impl ChunkMerkleTree {
    /// Build a tree over `leaves` in input order. Fails with
    /// `InvalidInput` on an empty list.
    pub fn build(leaves: &[Digest]) -> Result<Self, CoreError> {
        if leaves.is_empty() {
            return Err(CoreError::InvalidInput(
                "cannot build Merkle tree from empty digest list".into(),
            ));
        }

        let mut levels = vec![leaves.to_vec()];
        let mut current = leaves.to_vec();

        while current.len() > 1 {
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() {
                    &current[i + 1]
                } else {
                    left
                };
                next.push(hash_pair(left, right));
                i += 2;
            }
            levels.push(next.clone());
            current = next;
        }

        Ok(Self { levels })
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }
}

impl MerkleTree for ChunkMerkleTree {
    fn root(&self) -> Digest {
        self.levels.last().expect("at least one level")[0]
    }

    /// Authentication path from leaf `index` to the root.
    fn prove(&self, index: usize) -> Result<MerkleProof, CoreError> {
        if index >= self.leaf_count() {
            return Err(CoreError::InvalidInput(format!(
                "leaf index {index} out of range [0, {})",
                self.leaf_count()
            )));
        }

        let mut proof = Vec::new();
        let mut idx = index;

        // Skip the root level; every other level contributes one step.
        for level in &self.levels[..self.levels.len() - 1] {
            if idx % 2 == 0 {
                // Left child: sibling is to the right, or self if
                // this was the odd-trailing node at this level.
                let sibling_idx = idx + 1;
                let sibling = if sibling_idx < level.len() {
                    level[sibling_idx]
                } else {
                    level[idx]
                };
                proof.push(ProofStep {
                    sibling,
                    side: Side::Right,
                });
            } else {
                let sibling_idx = idx - 1;
                proof.push(ProofStep {
                    sibling: level[sibling_idx],
                    side: Side::Left,
                });
            }
            idx /= 2;
        }

        Ok(proof)
    }
}

/// Recompute the root from a leaf digest and its authentication path
/// and compare to `expected_root`.
pub fn verify(leaf: Digest, proof: &MerkleProof, expected_root: Digest) -> bool {
    let mut current = leaf;
    for step in proof {
        current = match step.side {
            Side::Left => hash_pair(&step.sibling, &current),
            Side::Right => hash_pair(&current, &step.sibling),
        };
    }
    current == expected_root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digests(n: usize) -> Vec<Digest> {
        (0..n)
            .map(|i| Sha256Hasher.digest(format!("leaf-{i}").as_bytes()))
            .collect()
    }

    #[test]
    fn build_rejects_empty() {
        assert!(matches!(
            ChunkMerkleTree::build(&[]),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn single_leaf_root_equals_leaf() {
        let leaves = digests(1);
        let tree = ChunkMerkleTree::build(&leaves).unwrap();
        assert_eq!(tree.root(), leaves[0]);
    }

    #[test]
    fn every_leaf_proves_against_root() {
        for n in [1usize, 2, 3, 4, 5, 7, 8, 15, 16, 17] {
            let leaves = digests(n);
            let tree = ChunkMerkleTree::build(&leaves).unwrap();
            let root = tree.root();
            for i in 0..n {
                let proof = tree.prove(i).unwrap();
                assert!(
                    verify(leaves[i], &proof, root),
                    "leaf {i} of {n} failed to verify"
                );
            }
        }
    }

    #[test]
    fn flipping_a_bit_anywhere_falsifies_verification() {
        let leaves = digests(5); // odd count forces a duplicated node.
        let tree = ChunkMerkleTree::build(&leaves).unwrap();
        let root = tree.root();
        let proof = tree.prove(2).unwrap();

        assert!(verify(leaves[2], &proof, root));

        let wrong_leaf = Sha256Hasher.digest(b"not-the-real-leaf");
        assert!(!verify(wrong_leaf, &proof, root));

        let mut tampered_proof = proof.clone();
        tampered_proof[0].sibling = Sha256Hasher.digest(b"tampered-sibling");
        assert!(!verify(leaves[2], &tampered_proof, root));

        let wrong_root = Sha256Hasher.digest(b"tampered-root");
        assert!(!verify(leaves[2], &proof, wrong_root));
    }

    #[test]
    fn odd_count_duplicates_last_leaf_at_each_level() {
        // 3 leaves: level 1 has 2 nodes: H(l0,l1), H(l2,l2).
        let leaves = digests(3);
        let tree = ChunkMerkleTree::build(&leaves).unwrap();
        let expected_dup_parent = hash_pair(&leaves[2], &leaves[2]);
        assert_eq!(tree.levels[1][1], expected_dup_parent);
    }

    #[test]
    fn prove_rejects_out_of_range_index() {
        let leaves = digests(4);
        let tree = ChunkMerkleTree::build(&leaves).unwrap();
        assert!(matches!(
            tree.prove(4),
            Err(CoreError::InvalidInput(_))
        ));
    }
}
