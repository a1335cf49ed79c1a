use starknet::core::types::Felt;

use crate::address::{AccountIndex, PoolIndex, TokenIndex};
use crate::command::nonce_felt;
use crate::error::{DecodeError, StorageError};
use crate::merkle::NodeStore;
use crate::share_calc::ShareCalcHelper;
use crate::storage::L2Storage;
use crate::utils::{felt_from_word, felt_to_word, negate};
use crate::wire::{CommandOp, RawCommand, WORD0_OFFSET, WORD1_OFFSET};
use crate::witness::PathInfo;

/// Registers a pool for the pair `(token0, token1)` at the next free pool index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPoolCommand {
    pub nonce: u64,
    pub token0: TokenIndex,
    pub token1: TokenIndex,
    pub relayer: AccountIndex,
}

impl AddPoolCommand {
    pub(crate) fn decode(raw: &RawCommand, relayer: AccountIndex) -> Result<Self, DecodeError> {
        raw.expect_unused_word0()?;
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            token0: raw.index0,
            token1: raw.index1,
            relayer,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        RawCommand::new(CommandOp::AddPool, self.nonce, self.token0, self.token1)
    }

    /// Paths: relayer nonce, pool count, pool leaf.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let mut paths = Vec::with_capacity(3);
        paths.push(
            storage
                .get_and_update_nonce(self.relayer, nonce_felt(self.nonce))
                .await?,
        );
        let (pool, path) = storage.get_and_increase_pool_count().await?;
        paths.push(path);
        paths.push(
            storage
                .pool(pool)
                .get_and_init(self.token0, self.token1)
                .await?,
        );
        Ok(paths)
    }
}

/// Shared arguments of Supply and Retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityCommand {
    pub nonce: u64,
    pub account: AccountIndex,
    pub pool: PoolIndex,
    pub amount0: Felt,
    pub amount1: Felt,
}

impl LiquidityCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        Ok(Self {
            nonce: raw.nonce,
            account: raw.index0,
            pool: raw.index1,
            amount0: felt_from_word(&raw.word0, WORD0_OFFSET)?,
            amount1: felt_from_word(&raw.word1, WORD1_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self, op: CommandOp) -> RawCommand {
        let mut raw = RawCommand::new(op, self.nonce, self.account, self.pool);
        raw.word0 = felt_to_word(&self.amount0);
        raw.word1 = felt_to_word(&self.amount1);
        raw
    }

    /// Paths: nonce, liquidity pair, balance token0, balance token1, share.
    pub async fn run_supply<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let share = ShareCalcHelper.calc_share(self.amount0, self.amount1);
        self.apply(
            storage,
            (self.amount0, self.amount1),
            (negate(self.amount0), negate(self.amount1)),
            share,
        )
        .await
    }

    /// Paths: nonce, liquidity pair, balance token0, balance token1, share.
    pub async fn run_retrieve<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let share = ShareCalcHelper.calc_share(self.amount0, self.amount1);
        self.apply(
            storage,
            (negate(self.amount0), negate(self.amount1)),
            (self.amount0, self.amount1),
            negate(share),
        )
        .await
    }

    async fn apply<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
        pool_deltas: (Felt, Felt),
        balance_deltas: (Felt, Felt),
        share_delta: Felt,
    ) -> Result<Vec<PathInfo>, StorageError> {
        storage.registered_pool(self.pool).await?;
        let mut paths = Vec::with_capacity(5);
        paths.push(
            storage
                .account(self.account)
                .get_and_update_nonce(nonce_felt(self.nonce))
                .await?,
        );
        let (token0, token1, path) = storage
            .pool(self.pool)
            .get_and_add_liq(pool_deltas.0, pool_deltas.1)
            .await?;
        paths.push(path);

        let mut account = storage.account(self.account);
        paths.push(account.get_and_add_balance(token0, balance_deltas.0).await?);
        paths.push(account.get_and_add_balance(token1, balance_deltas.1).await?);
        paths.push(account.get_and_add_share(self.pool, share_delta).await?);
        Ok(paths)
    }
}
