use starknet::core::types::Felt;

use crate::address::{AccountIndex, PoolIndex};
use crate::command::nonce_felt;
use crate::error::{DecodeError, StorageError};
use crate::merkle::NodeStore;
use crate::share_calc::ShareCalcHelper;
use crate::storage::L2Storage;
use crate::utils::{felt_from_word, felt_to_word, negate};
use crate::wire::{CommandOp, RawCommand, WORD0_OFFSET, WORD1_OFFSET};
use crate::witness::PathInfo;

/// Swaps `amount` against `pool`. With `reverse == 0` the account supplies
/// token0 and receives token1; any other value flips the direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCommand {
    pub nonce: u64,
    pub account: AccountIndex,
    pub pool: PoolIndex,
    pub reverse: Felt,
    pub amount: Felt,
}

/// Field deltas applied by one swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapDeltas {
    pub profit: Felt,
    pub liquidity0: Felt,
    pub liquidity1: Felt,
    pub balance0: Felt,
    pub balance1: Felt,
}

impl SwapCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        Ok(Self {
            nonce: raw.nonce,
            account: raw.index0,
            pool: raw.index1,
            reverse: felt_from_word(&raw.word0, WORD0_OFFSET)?,
            amount: felt_from_word(&raw.word1, WORD1_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::Swap, self.nonce, self.account, self.pool);
        raw.word0 = felt_to_word(&self.reverse);
        raw.word1 = felt_to_word(&self.amount);
        raw
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse != Felt::ZERO
    }

    /// The pool keeps the fee: its outgoing side moves by `profit - amount`
    /// while the account's incoming side is credited `amount + profit`.
    pub fn deltas(&self) -> SwapDeltas {
        let profit = ShareCalcHelper.calc_profit(self.amount);
        let supplied = self.amount;
        let pool_out = negate(self.amount) + profit;
        let account_in = self.amount + profit;
        let account_out = negate(self.amount);
        if self.is_reverse() {
            SwapDeltas {
                profit,
                liquidity0: pool_out,
                liquidity1: supplied,
                balance0: account_in,
                balance1: account_out,
            }
        } else {
            SwapDeltas {
                profit,
                liquidity0: supplied,
                liquidity1: pool_out,
                balance0: account_out,
                balance1: account_in,
            }
        }
    }

    /// Paths: nonce, liquidity pair, balance token0, balance token1.
    ///
    /// Share price K is bumped by the profit between the nonce and liquidity
    /// writes; that write moves the root but its witness is not returned.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        storage.registered_pool(self.pool).await?;
        let deltas = self.deltas();
        let mut paths = Vec::with_capacity(4);

        paths.push(
            storage
                .account(self.account)
                .get_and_update_nonce(nonce_felt(self.nonce))
                .await?,
        );

        let mut pool = storage.pool(self.pool);
        pool.get_and_update_share_price_k(deltas.profit).await?;
        let (token0, token1, path) = pool
            .get_and_add_liq(deltas.liquidity0, deltas.liquidity1)
            .await?;
        paths.push(path);

        let mut account = storage.account(self.account);
        paths.push(account.get_and_add_balance(token0, deltas.balance0).await?);
        paths.push(account.get_and_add_balance(token1, deltas.balance1).await?);
        Ok(paths)
    }
}
