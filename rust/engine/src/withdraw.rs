use starknet::core::types::Felt;

use crate::address::{AccountIndex, TokenIndex};
use crate::command::nonce_felt;
use crate::error::{DecodeError, StorageError};
use crate::merkle::NodeStore;
use crate::storage::L2Storage;
use crate::utils::{felt_from_word, felt_to_word, negate};
use crate::wire::{CommandOp, RawCommand, WORD0_OFFSET, WORD1_OFFSET};
use crate::witness::PathInfo;

/// Debits `amount` of `token` from `account` for release to `l1_address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawCommand {
    pub nonce: u64,
    pub account: AccountIndex,
    pub token: TokenIndex,
    pub amount: Felt,
    pub l1_address: Felt,
}

impl WithdrawCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        Ok(Self {
            nonce: raw.nonce,
            account: raw.index0,
            token: raw.index1,
            amount: felt_from_word(&raw.word0, WORD0_OFFSET)?,
            l1_address: felt_from_word(&raw.word1, WORD1_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::Withdraw, self.nonce, self.account, self.token);
        raw.word0 = felt_to_word(&self.amount);
        raw.word1 = felt_to_word(&self.l1_address);
        raw
    }

    /// Paths: nonce, balance.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let mut account = storage.account(self.account);
        let mut paths = Vec::with_capacity(2);
        paths.push(account.get_and_update_nonce(nonce_felt(self.nonce)).await?);
        paths.push(
            account
                .get_and_add_balance(self.token, negate(self.amount))
                .await?,
        );
        Ok(paths)
    }
}
