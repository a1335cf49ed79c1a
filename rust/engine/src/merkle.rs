//! Sparse Poseidon Merkle tree over fixed-width leaves.
//! Nodes equal to the zero hash of their level are never stored.

use std::collections::HashMap;

use async_trait::async_trait;
use starknet::core::types::Felt;
use starknet_crypto::{poseidon_hash, poseidon_hash_many};

use crate::error::{AddressError, StorageError};

pub const LEAF_WIDTH: usize = 4;

pub type Leaf = [Felt; LEAF_WIDTH];

pub const EMPTY_LEAF: Leaf = [Felt::ZERO; LEAF_WIDTH];

/// Backing storage for tree nodes. Every call is one I/O boundary; the tree
/// awaits them strictly one after another.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn get_leaf(&self, index: u64) -> Result<Option<Leaf>, StorageError>;
    async fn put_leaf(&mut self, index: u64, leaf: Leaf) -> Result<(), StorageError>;
    async fn remove_leaf(&mut self, index: u64) -> Result<(), StorageError>;
    async fn get_node(&self, level: usize, index: u64) -> Result<Option<Felt>, StorageError>;
    async fn put_node(&mut self, level: usize, index: u64, hash: Felt) -> Result<(), StorageError>;
    async fn remove_node(&mut self, level: usize, index: u64) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    leaves: HashMap<u64, Leaf>,
    nodes: HashMap<(usize, u64), Felt>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get_leaf(&self, index: u64) -> Result<Option<Leaf>, StorageError> {
        Ok(self.leaves.get(&index).copied())
    }

    async fn put_leaf(&mut self, index: u64, leaf: Leaf) -> Result<(), StorageError> {
        self.leaves.insert(index, leaf);
        Ok(())
    }

    async fn remove_leaf(&mut self, index: u64) -> Result<(), StorageError> {
        self.leaves.remove(&index);
        Ok(())
    }

    async fn get_node(&self, level: usize, index: u64) -> Result<Option<Felt>, StorageError> {
        Ok(self.nodes.get(&(level, index)).copied())
    }

    async fn put_node(&mut self, level: usize, index: u64, hash: Felt) -> Result<(), StorageError> {
        self.nodes.insert((level, index), hash);
        Ok(())
    }

    async fn remove_node(&mut self, level: usize, index: u64) -> Result<(), StorageError> {
        self.nodes.remove(&(level, index));
        Ok(())
    }
}

/// Result of one leaf write: everything a witness needs about the mutation.
#[derive(Debug, Clone)]
pub struct LeafUpdate {
    pub old_leaf: Leaf,
    pub siblings: Vec<Felt>,
    pub root_before: Felt,
    pub root_after: Felt,
}

#[derive(Debug)]
pub struct MerkleTree<S> {
    height: usize,
    zero_hashes: Vec<Felt>,
    root: Felt,
    store: S,
}

impl<S: NodeStore> MerkleTree<S> {
    /// Opens a tree over `store`, picking up the root it already holds.
    pub async fn new(store: S, height: usize) -> Result<Self, StorageError> {
        let zero_hashes = zero_hashes(height);
        let root = store
            .get_node(height, 0)
            .await?
            .unwrap_or(zero_hashes[height]);
        Ok(Self {
            height,
            zero_hashes,
            root,
            store,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn root(&self) -> Felt {
        self.root
    }

    pub fn empty_root(&self) -> Felt {
        self.zero_hashes[self.height]
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn read_leaf(&self, index: u64) -> Result<Leaf, StorageError> {
        self.check_index(index)?;
        Ok(self.store.get_leaf(index).await?.unwrap_or(EMPTY_LEAF))
    }

    pub async fn update_leaf(
        &mut self,
        index: u64,
        leaf: Leaf,
    ) -> Result<LeafUpdate, StorageError> {
        self.check_index(index)?;
        let old_leaf = self.read_leaf(index).await?;
        let root_before = self.root;

        if leaf == EMPTY_LEAF {
            self.store.remove_leaf(index).await?;
        } else {
            self.store.put_leaf(index, leaf).await?;
        }

        let mut siblings = Vec::with_capacity(self.height);
        let mut current = hash_leaf(&leaf);
        let mut idx = index;
        for level in 0..self.height {
            self.write_node(level, idx, current).await?;
            let is_right = (idx % 2) == 1;
            let sibling = self.node_at(level, idx ^ 1).await?;
            siblings.push(sibling);
            let (left, right) = if is_right {
                (sibling, current)
            } else {
                (current, sibling)
            };
            current = poseidon_hash(left, right);
            idx /= 2;
        }
        self.write_node(self.height, 0, current).await?;
        self.root = current;

        Ok(LeafUpdate {
            old_leaf,
            siblings,
            root_before,
            root_after: current,
        })
    }

    /// Sibling hashes for `index` against the current root, leaf level first.
    pub async fn path(&self, index: u64) -> Result<Vec<Felt>, StorageError> {
        self.check_index(index)?;
        let mut path = Vec::with_capacity(self.height);
        let mut idx = index;
        for level in 0..self.height {
            path.push(self.node_at(level, idx ^ 1).await?);
            idx /= 2;
        }
        Ok(path)
    }

    async fn node_at(&self, level: usize, index: u64) -> Result<Felt, StorageError> {
        Ok(self
            .store
            .get_node(level, index)
            .await?
            .unwrap_or(self.zero_hashes[level]))
    }

    async fn write_node(
        &mut self,
        level: usize,
        index: u64,
        hash: Felt,
    ) -> Result<(), StorageError> {
        if hash == self.zero_hashes[level] {
            self.store.remove_node(level, index).await
        } else {
            self.store.put_node(level, index, hash).await
        }
    }

    fn check_index(&self, index: u64) -> Result<(), StorageError> {
        if self.height < 64 && index >> self.height != 0 {
            return Err(AddressError::OutOfRange {
                field: "leaf index",
                value: index,
                bits: self.height as u32,
            }
            .into());
        }
        Ok(())
    }
}

pub fn hash_leaf(leaf: &Leaf) -> Felt {
    poseidon_hash_many(&leaf[..])
}

/// Folds a leaf up through its siblings; equals the root the path was taken against.
pub fn compute_root(leaf: &Leaf, index: u64, siblings: &[Felt]) -> Felt {
    let mut hash = hash_leaf(leaf);
    let mut idx = index;
    for sibling in siblings {
        let (left, right) = if idx % 2 == 1 {
            (*sibling, hash)
        } else {
            (hash, *sibling)
        };
        hash = poseidon_hash(left, right);
        idx /= 2;
    }
    hash
}

pub fn verify_path(leaf: &Leaf, index: u64, siblings: &[Felt], root: Felt) -> bool {
    compute_root(leaf, index, siblings) == root
}

fn zero_hashes(height: usize) -> Vec<Felt> {
    let mut zeros = Vec::with_capacity(height + 1);
    zeros.push(hash_leaf(&EMPTY_LEAF));
    for i in 1..=height {
        let prev = zeros[i - 1];
        zeros.push(poseidon_hash(prev, prev));
    }
    zeros
}
