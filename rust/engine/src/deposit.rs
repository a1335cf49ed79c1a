use starknet::core::types::Felt;

use crate::address::{AccountIndex, TokenIndex};
use crate::command::nonce_felt;
use crate::error::{DecodeError, StorageError};
use crate::merkle::NodeStore;
use crate::storage::L2Storage;
use crate::utils::{felt_from_word, felt_to_word};
use crate::wire::{CommandOp, RawCommand, WORD0_OFFSET};
use crate::witness::PathInfo;

/// Credits `amount` of `token` to `account`; submitted by the operator, whose
/// nonce is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCommand {
    pub nonce: u64,
    pub account: AccountIndex,
    pub token: TokenIndex,
    pub amount: Felt,
    pub relayer: AccountIndex,
}

impl DepositCommand {
    pub(crate) fn decode(raw: &RawCommand, relayer: AccountIndex) -> Result<Self, DecodeError> {
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            account: raw.index0,
            token: raw.index1,
            amount: felt_from_word(&raw.word0, WORD0_OFFSET)?,
            relayer,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::Deposit, self.nonce, self.account, self.token);
        raw.word0 = felt_to_word(&self.amount);
        raw
    }

    /// Paths: relayer nonce, balance.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let mut paths = Vec::with_capacity(2);
        paths.push(
            storage
                .get_and_update_nonce(self.relayer, nonce_felt(self.nonce))
                .await?,
        );
        paths.push(
            storage
                .get_and_add_balance(self.account, self.token, self.amount)
                .await?,
        );
        Ok(paths)
    }
}
