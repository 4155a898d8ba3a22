// Binary Merkle tree over keccak256 hashes with sorted pair hashing, the
// scheme the deployed collection contracts verify whitelist mints against.

use ethers::types::H256;
use ethers::utils::keccak256;

use crate::error::WhitelistError;

/// Hash a node pair with the smaller hash first. Sorting the pair means the
/// verifier only needs the sibling hashes, not left/right positions.
pub fn hash_pair(a: H256, b: H256) -> H256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_bytes());
    buf[32..].copy_from_slice(hi.as_bytes());
    H256::from(keccak256(buf))
}

/// Recompute a root from a leaf and its sibling path. This is the same fold
/// the on-chain verifier performs when checking a whitelist mint.
pub fn verify_proof(leaf: H256, proof: &[H256], root: H256) -> bool {
    let computed = proof
        .iter()
        .fold(leaf, |acc, sibling| hash_pair(acc, *sibling));
    computed == root
}

/// Merkle tree over 32-byte leaves.
///
/// Leaves are sorted before the bottom layer is built, so the root depends
/// only on the leaf multiset and not on input order. An odd node at the end
/// of a layer is promoted unchanged to the next layer; there is no
/// duplication or zero padding.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<H256>>,
}

impl MerkleTree {
    pub fn new(mut leaves: Vec<H256>) -> Self {
        if leaves.is_empty() {
            return Self { layers: Vec::new() };
        }

        leaves.sort();

        let mut layers = vec![leaves];
        while layers.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = layers.last().expect("non-empty layer list");
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                match pair {
                    [left, right] => next.push(hash_pair(*left, *right)),
                    [odd] => next.push(*odd),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                }
            }
            layers.push(next);
        }

        Self { layers }
    }

    pub fn leaf_count(&self) -> usize {
        self.layers.first().map(Vec::len).unwrap_or(0)
    }

    pub fn root(&self) -> Result<H256, WhitelistError> {
        self.layers
            .last()
            .and_then(|top| top.first())
            .copied()
            .ok_or(WhitelistError::EmptyTree)
    }

    /// Sibling path for `leaf`, bottom-up. An absent leaf is an explicit
    /// error rather than an empty path, which a caller could mistake for a
    /// valid single-leaf proof.
    pub fn proof(&self, leaf: H256) -> Result<Vec<H256>, WhitelistError> {
        let mut index = self
            .layers
            .first()
            .and_then(|leaves| leaves.iter().position(|l| *l == leaf))
            .ok_or(WhitelistError::LeafNotFound)?;

        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
            if sibling < layer.len() {
                proof.push(layer[sibling]);
            }
            index /= 2;
        }

        Ok(proof)
    }
}
