//! Pool view over the liquidity pair and share price K of one pool index.

use starknet::core::types::Felt;

use crate::address::{PoolIndex, TokenIndex};
use crate::error::StorageError;
use crate::merkle::NodeStore;
use crate::storage::{L2Storage, PoolState};
use crate::witness::PathInfo;

pub struct Pool<'a, S> {
    storage: &'a mut L2Storage<S>,
    index: PoolIndex,
}

impl<'a, S: NodeStore> Pool<'a, S> {
    pub fn new(storage: &'a mut L2Storage<S>, index: PoolIndex) -> Self {
        Self { storage, index }
    }

    pub fn index(&self) -> PoolIndex {
        self.index
    }

    pub async fn get_and_add_liq(
        &mut self,
        delta0: Felt,
        delta1: Felt,
    ) -> Result<(TokenIndex, TokenIndex, PathInfo), StorageError> {
        self.storage.get_and_add_liq(self.index, delta0, delta1).await
    }

    pub async fn get_and_update_share_price_k(
        &mut self,
        profit: Felt,
    ) -> Result<PathInfo, StorageError> {
        self.storage.get_and_update_share_price_k(self.index, profit).await
    }

    pub async fn get_and_init(
        &mut self,
        token0: TokenIndex,
        token1: TokenIndex,
    ) -> Result<PathInfo, StorageError> {
        self.storage.get_and_init_pool(self.index, token0, token1).await
    }

    pub async fn state(&self) -> Result<PoolState, StorageError> {
        self.storage.read_pool(self.index).await
    }
}
