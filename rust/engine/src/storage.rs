//! Merkle-backed slot storage. Every `get_and_*` call reads one leaf, writes
//! its new value and hands back the witness for that single mutation.
//!
//! Nothing here checks nonce order, signs or overflow; those belong to the
//! circuit that consumes the witnesses.

use starknet::core::types::Felt;
use tracing::debug;

use crate::account::Account;
use crate::address::{AccountIndex, NftIndex, PoolIndex, SlotAddress, TokenIndex, TREE_HEIGHT};
use crate::error::StorageError;
use crate::merkle::{Leaf, MemoryNodeStore, MerkleTree, NodeStore, EMPTY_LEAF};
use crate::nft::Nft;
use crate::pool::Pool;
use crate::utils::felt_to_u32;
use crate::witness::PathInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub token0: TokenIndex,
    pub token1: TokenIndex,
    pub liquidity0: Felt,
    pub liquidity1: Felt,
}

#[derive(Debug)]
pub struct L2Storage<S> {
    tree: MerkleTree<S>,
}

impl L2Storage<MemoryNodeStore> {
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::new(MemoryNodeStore::new()).await
    }
}

impl<S: NodeStore> L2Storage<S> {
    pub async fn new(store: S) -> Result<Self, StorageError> {
        let tree = MerkleTree::new(store, TREE_HEIGHT).await?;
        Ok(Self { tree })
    }

    pub fn root(&self) -> Felt {
        self.tree.root()
    }

    pub fn account(&mut self, index: AccountIndex) -> Account<'_, S> {
        Account::new(self, index)
    }

    pub fn pool(&mut self, index: PoolIndex) -> Pool<'_, S> {
        Pool::new(self, index)
    }

    pub fn nft(&mut self, index: NftIndex) -> Nft<'_, S> {
        Nft::new(self, index)
    }

    pub async fn get_and_update_nonce(
        &mut self,
        account: AccountIndex,
        nonce: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::Nonce { account }, |_| scalar_leaf(nonce))
            .await
    }

    pub async fn get_and_add_balance(
        &mut self,
        account: AccountIndex,
        token: TokenIndex,
        delta: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::Balance { account, token }, |old| {
            scalar_leaf(old[0] + delta)
        })
        .await
    }

    /// Returns the pool's token pair together with the liquidity witness.
    pub async fn get_and_add_liq(
        &mut self,
        pool: PoolIndex,
        delta0: Felt,
        delta1: Felt,
    ) -> Result<(TokenIndex, TokenIndex, PathInfo), StorageError> {
        let address = SlotAddress::PoolLiquidity { pool };
        let PoolState { token0, token1, .. } = self.registered_pool(pool).await?;
        let path = self
            .update(address, |old| [old[0], old[1], old[2] + delta0, old[3] + delta1])
            .await?;
        Ok((token0, token1, path))
    }

    pub async fn get_and_update_share_price_k(
        &mut self,
        pool: PoolIndex,
        profit: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::PoolSharePriceK { pool }, |old| {
            scalar_leaf(old[0] + profit)
        })
        .await
    }

    pub async fn get_and_add_share(
        &mut self,
        account: AccountIndex,
        pool: PoolIndex,
        delta: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::Share { account, pool }, |old| scalar_leaf(old[0] + delta))
            .await
    }

    pub async fn get_and_init_pool(
        &mut self,
        pool: PoolIndex,
        token0: TokenIndex,
        token1: TokenIndex,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::PoolLiquidity { pool }, |_| {
            [Felt::from(token0), Felt::from(token1), Felt::ZERO, Felt::ZERO]
        })
        .await
    }

    /// Allocates the next pool index; the counter leaf holds the number of pools.
    pub async fn get_and_increase_pool_count(
        &mut self,
    ) -> Result<(PoolIndex, PathInfo), StorageError> {
        let path = self
            .update(SlotAddress::PoolCount, |old| scalar_leaf(old[0] + Felt::ONE))
            .await?;
        let index = felt_to_u32(&path.old_leaf[0])
            .ok_or_else(|| StorageError::Corrupt("pool count exceeds u32".to_string()))?;
        Ok((index, path))
    }

    pub async fn get_and_update_nft(
        &mut self,
        nft: NftIndex,
        leaf: Leaf,
    ) -> Result<PathInfo, StorageError> {
        self.update(SlotAddress::Nft { nft }, |_| leaf).await
    }

    pub async fn read_nonce(&self, account: AccountIndex) -> Result<Felt, StorageError> {
        Ok(self.read(SlotAddress::Nonce { account }).await?[0])
    }

    pub async fn read_balance(
        &self,
        account: AccountIndex,
        token: TokenIndex,
    ) -> Result<Felt, StorageError> {
        Ok(self.read(SlotAddress::Balance { account, token }).await?[0])
    }

    pub async fn read_pool(&self, pool: PoolIndex) -> Result<PoolState, StorageError> {
        let leaf = self.read(SlotAddress::PoolLiquidity { pool }).await?;
        Ok(PoolState {
            token0: token_index(&leaf[0], pool)?,
            token1: token_index(&leaf[1], pool)?,
            liquidity0: leaf[2],
            liquidity1: leaf[3],
        })
    }

    /// Pool state, failing for a leaf AddPool never wrote. Registered pairs
    /// always hold two distinct tokens; an empty leaf reads as `(0, 0)`.
    pub async fn registered_pool(&self, pool: PoolIndex) -> Result<PoolState, StorageError> {
        let state = self.read_pool(pool).await?;
        if state.token0 == state.token1 {
            return Err(StorageError::UnregisteredPool(pool));
        }
        Ok(state)
    }

    pub async fn read_share_price_k(&self, pool: PoolIndex) -> Result<Felt, StorageError> {
        Ok(self.read(SlotAddress::PoolSharePriceK { pool }).await?[0])
    }

    pub async fn read_share(
        &self,
        account: AccountIndex,
        pool: PoolIndex,
    ) -> Result<Felt, StorageError> {
        Ok(self.read(SlotAddress::Share { account, pool }).await?[0])
    }

    pub async fn read_pool_count(&self) -> Result<Felt, StorageError> {
        Ok(self.read(SlotAddress::PoolCount).await?[0])
    }

    pub async fn read_nft(&self, nft: NftIndex) -> Result<Leaf, StorageError> {
        self.read(SlotAddress::Nft { nft }).await
    }

    pub async fn read(&self, address: SlotAddress) -> Result<Leaf, StorageError> {
        let index = address.leaf_index()?;
        self.tree.read_leaf(index).await
    }

    async fn update<F>(&mut self, address: SlotAddress, apply: F) -> Result<PathInfo, StorageError>
    where
        F: FnOnce(&Leaf) -> Leaf + Send,
    {
        let leaf_index = address.leaf_index()?;
        let old_leaf = self.tree.read_leaf(leaf_index).await?;
        let new_leaf = apply(&old_leaf);
        let update = self.tree.update_leaf(leaf_index, new_leaf).await?;
        debug!(?address, leaf_index, "slot updated");
        Ok(PathInfo {
            address,
            leaf_index,
            old_leaf: update.old_leaf,
            new_leaf,
            siblings: update.siblings,
            root_before: update.root_before,
            root_after: update.root_after,
        })
    }
}

fn scalar_leaf(value: Felt) -> Leaf {
    let mut leaf = EMPTY_LEAF;
    leaf[0] = value;
    leaf
}

fn token_index(value: &Felt, pool: PoolIndex) -> Result<TokenIndex, StorageError> {
    felt_to_u32(value)
        .ok_or_else(|| StorageError::Corrupt(format!("pool {pool} token index is not a u32")))
}
