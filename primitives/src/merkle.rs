//! Sorted-key Merkle tree for deterministic root computation.
//!
//! All key-value pairs are sorted by key, hashed into leaves, then combined
//! pairwise into a binary tree. Given the same set of entries, `root()`
//! returns the same hash regardless of insertion order.
//!
//! Ordered lists (transactions, receipts) are committed with [`derive_root`],
//! which keys each item by its big-endian index so that key order equals
//! list order.

use std::collections::BTreeMap;

use crate::crypto::hash_blake3;
use crate::types::{Hash, ZERO_HASH};

/// Domain separator for leaf nodes (prevents second-preimage attacks).
const LEAF_PREFIX: u8 = 0x00;
/// Domain separator for internal nodes.
const INTERNAL_PREFIX: u8 = 0x01;

/// Merkle tree over sorted key-value pairs.
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a key-value pair.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.insert(key.to_vec(), value);
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the root.
    ///
    /// Empty tree returns `ZERO_HASH`, a single entry returns its leaf hash.
    pub fn root(&self) -> Hash {
        let leaves: Vec<Hash> = self
            .entries
            .iter()
            .map(|(k, v)| hash_leaf(k, v))
            .collect();
        compute_root_from_leaves(&leaves)
    }
}

/// Ordered root over a list, each item committed under its big-endian index.
pub fn derive_root<T>(items: &[T], encode: impl Fn(&T) -> Vec<u8>) -> Hash {
    let mut tree = MerkleTree::new();
    for (index, item) in items.iter().enumerate() {
        tree.insert(&(index as u64).to_be_bytes(), encode(item));
    }
    tree.root()
}

/// Hash a leaf node: H(LEAF_PREFIX || key_len_le32 || key || value)
fn hash_leaf(key: &[u8], value: &[u8]) -> Hash {
    let key_len = (key.len() as u32).to_le_bytes();
    let mut data = Vec::with_capacity(1 + 4 + key.len() + value.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(&key_len);
    data.extend_from_slice(key);
    data.extend_from_slice(value);
    hash_blake3(&data)
}

/// Hash an internal node: H(INTERNAL_PREFIX || left || right)
fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 1 + 32 + 32];
    data[0] = INTERNAL_PREFIX;
    data[1..33].copy_from_slice(left);
    data[33..65].copy_from_slice(right);
    hash_blake3(&data)
}

/// Combine leaves level by level. An odd trailing node is promoted as is.
fn compute_root_from_leaves(leaves: &[Hash]) -> Hash {
    match leaves {
        [] => return ZERO_HASH,
        [single] => return *single,
        _ => {}
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_internal(left, right),
                [odd] => *odd,
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level[0]
}
