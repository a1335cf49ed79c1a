//! The closed command set. Decoding dispatches on the opcode byte; running
//! dispatches on the variant. Each variant documents its mutation order,
//! which is the order of the returned witnesses.

use starknet::core::types::Felt;
use tracing::debug;

use crate::address::{check_account, check_nft, check_pool, check_token, AccountIndex, TokenIndex};
use crate::deposit::DepositCommand;
use crate::error::{DecodeError, StorageError};
use crate::liquidity::{AddPoolCommand, LiquidityCommand};
use crate::merkle::NodeStore;
use crate::nft::{
    BidNftCommand, DepositNftCommand, FinalizeNftCommand, TransferNftCommand, WithdrawNftCommand,
};
use crate::storage::L2Storage;
use crate::swap::SwapCommand;
use crate::utils::hex_to_bytes;
use crate::wire::{CommandOp, RawCommand, COMMAND_LEN};
use crate::withdraw::WithdrawCommand;
use crate::witness::PathInfo;

/// Settings every command execution sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionContext {
    /// Token NFT bids are escrowed in.
    pub nft_bid_token: TokenIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddPool(AddPoolCommand),
    Withdraw(WithdrawCommand),
    Swap(SwapCommand),
    Supply(LiquidityCommand),
    Retrieve(LiquidityCommand),
    Deposit(DepositCommand),
    DepositNft(DepositNftCommand),
    WithdrawNft(WithdrawNftCommand),
    TransferNft(TransferNftCommand),
    BidNft(BidNftCommand),
    FinalizeNft(FinalizeNftCommand),
}

impl Command {
    /// `relayer` is the submitting operator account; only relayed opcodes use it.
    pub fn decode(bytes: &[u8], relayer: AccountIndex) -> Result<Self, DecodeError> {
        let raw = RawCommand::decode(bytes)?;
        Self::from_raw(&raw, relayer)
    }

    pub fn decode_hex(payload: &str, relayer: AccountIndex) -> Result<Self, DecodeError> {
        let bytes = hex_to_bytes(payload)?;
        Self::decode(&bytes, relayer)
    }

    pub fn from_raw(raw: &RawCommand, relayer: AccountIndex) -> Result<Self, DecodeError> {
        let command = match raw.op {
            CommandOp::AddPool => Command::AddPool(AddPoolCommand::decode(raw, relayer)?),
            CommandOp::Withdraw => Command::Withdraw(WithdrawCommand::decode(raw)?),
            CommandOp::Swap => Command::Swap(SwapCommand::decode(raw)?),
            CommandOp::Supply => Command::Supply(LiquidityCommand::decode(raw)?),
            CommandOp::Retrieve => Command::Retrieve(LiquidityCommand::decode(raw)?),
            CommandOp::Deposit => Command::Deposit(DepositCommand::decode(raw, relayer)?),
            CommandOp::DepositNft => Command::DepositNft(DepositNftCommand::decode(raw, relayer)?),
            CommandOp::WithdrawNft => Command::WithdrawNft(WithdrawNftCommand::decode(raw)?),
            CommandOp::TransferNft => Command::TransferNft(TransferNftCommand::decode(raw)?),
            CommandOp::BidNft => Command::BidNft(BidNftCommand::decode(raw)?),
            CommandOp::FinalizeNft => Command::FinalizeNft(FinalizeNftCommand::decode(raw)?),
        };
        command.check_indices()?;
        Ok(command)
    }

    /// Rejects indices no slot can hold, so they never reach storage.
    pub fn check_indices(&self) -> Result<(), DecodeError> {
        check_account(self.caller_account_index())?;
        match self {
            Command::AddPool(cmd) => {
                check_token(cmd.token0)?;
                check_token(cmd.token1)?;
                // A pair must name two balance slots.
                if cmd.token0 == cmd.token1 {
                    return Err(DecodeError::SameToken { token: cmd.token0 });
                }
            }
            Command::Withdraw(cmd) => check_token(cmd.token)?,
            Command::Swap(cmd) => check_pool(cmd.pool)?,
            Command::Supply(cmd) | Command::Retrieve(cmd) => check_pool(cmd.pool)?,
            Command::Deposit(cmd) => {
                check_account(cmd.account)?;
                check_token(cmd.token)?;
            }
            Command::DepositNft(cmd) => {
                check_account(cmd.owner)?;
                check_nft(cmd.nft)?;
            }
            Command::WithdrawNft(cmd) => check_nft(cmd.nft)?,
            Command::TransferNft(cmd) => check_nft(cmd.nft)?,
            Command::BidNft(cmd) => check_nft(cmd.nft)?,
            Command::FinalizeNft(cmd) => check_nft(cmd.nft)?,
        }
        Ok(())
    }

    /// Position in the returned witnesses that follows a write with no
    /// witness of its own, so that entry does not chain from the one before.
    /// Swap moves share price K between its nonce and liquidity entries.
    pub fn witness_gap(&self) -> Option<usize> {
        match self {
            Command::Swap(_) => Some(1),
            _ => None,
        }
    }

    pub fn to_raw(&self) -> RawCommand {
        match self {
            Command::AddPool(cmd) => cmd.encode(),
            Command::Withdraw(cmd) => cmd.encode(),
            Command::Swap(cmd) => cmd.encode(),
            Command::Supply(cmd) => cmd.encode(CommandOp::Supply),
            Command::Retrieve(cmd) => cmd.encode(CommandOp::Retrieve),
            Command::Deposit(cmd) => cmd.encode(),
            Command::DepositNft(cmd) => cmd.encode(),
            Command::WithdrawNft(cmd) => cmd.encode(),
            Command::TransferNft(cmd) => cmd.encode(),
            Command::BidNft(cmd) => cmd.encode(),
            Command::FinalizeNft(cmd) => cmd.encode(),
        }
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        self.to_raw().encode()
    }

    pub fn op(&self) -> CommandOp {
        match self {
            Command::AddPool(_) => CommandOp::AddPool,
            Command::Withdraw(_) => CommandOp::Withdraw,
            Command::Swap(_) => CommandOp::Swap,
            Command::Supply(_) => CommandOp::Supply,
            Command::Retrieve(_) => CommandOp::Retrieve,
            Command::Deposit(_) => CommandOp::Deposit,
            Command::DepositNft(_) => CommandOp::DepositNft,
            Command::WithdrawNft(_) => CommandOp::WithdrawNft,
            Command::TransferNft(_) => CommandOp::TransferNft,
            Command::BidNft(_) => CommandOp::BidNft,
            Command::FinalizeNft(_) => CommandOp::FinalizeNft,
        }
    }

    pub fn nonce(&self) -> u64 {
        self.to_raw().nonce
    }

    /// Account whose nonce the command consumes.
    pub fn caller_account_index(&self) -> AccountIndex {
        match self {
            Command::AddPool(cmd) => cmd.relayer,
            Command::Withdraw(cmd) => cmd.account,
            Command::Swap(cmd) => cmd.account,
            Command::Supply(cmd) | Command::Retrieve(cmd) => cmd.account,
            Command::Deposit(cmd) => cmd.relayer,
            Command::DepositNft(cmd) => cmd.relayer,
            Command::WithdrawNft(cmd) => cmd.caller,
            Command::TransferNft(cmd) => cmd.caller,
            Command::BidNft(cmd) => cmd.caller,
            Command::FinalizeNft(cmd) => cmd.caller,
        }
    }

    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let paths = match self {
            Command::AddPool(cmd) => cmd.run(storage).await?,
            Command::Withdraw(cmd) => cmd.run(storage).await?,
            Command::Swap(cmd) => cmd.run(storage).await?,
            Command::Supply(cmd) => cmd.run_supply(storage).await?,
            Command::Retrieve(cmd) => cmd.run_retrieve(storage).await?,
            Command::Deposit(cmd) => cmd.run(storage).await?,
            Command::DepositNft(cmd) => cmd.run(storage).await?,
            Command::WithdrawNft(cmd) => cmd.run(storage, ctx.nft_bid_token).await?,
            Command::TransferNft(cmd) => cmd.run(storage).await?,
            Command::BidNft(cmd) => cmd.run(storage, ctx.nft_bid_token).await?,
            Command::FinalizeNft(cmd) => cmd.run(storage, ctx.nft_bid_token).await?,
        };
        debug!(op = self.op().name(), paths = paths.len(), "command applied");
        Ok(paths)
    }
}

pub(crate) fn nonce_felt(nonce: u64) -> Felt {
    Felt::from(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AddressError;
    use crate::utils::felt_to_word;
    use crate::wire::{WORD0_OFFSET, WORD1_OFFSET};

    fn word(value: u64) -> [u8; 32] {
        felt_to_word(&Felt::from(value))
    }

    fn sample_buffers() -> Vec<[u8; COMMAND_LEN]> {
        let mut buffers = Vec::new();
        for op in CommandOp::ALL {
            let mut raw = RawCommand::new(op, 77, 3, 5);
            match op {
                CommandOp::AddPool => {}
                CommandOp::Withdraw
                | CommandOp::Swap
                | CommandOp::Supply
                | CommandOp::Retrieve => {
                    raw.word0 = word(1);
                    raw.word1 = word(1000);
                }
                CommandOp::Deposit
                | CommandOp::DepositNft
                | CommandOp::WithdrawNft
                | CommandOp::TransferNft
                | CommandOp::BidNft => {
                    raw.word0 = word(0xdead_beef);
                }
                CommandOp::FinalizeNft => {}
            }
            buffers.push(raw.encode());
        }
        buffers
    }

    #[test]
    fn every_opcode_reencodes_byte_for_byte() {
        for buffer in sample_buffers() {
            let command = Command::decode(&buffer, 9).unwrap();
            assert_eq!(command.op() as u8, buffer[0]);
            assert_eq!(command.encode(), buffer);
            assert_eq!(command.nonce(), 77);
        }
    }

    #[test]
    fn caller_comes_from_relayer_only_for_relayed_ops() {
        for buffer in sample_buffers() {
            let command = Command::decode(&buffer, 9).unwrap();
            let expected = if command.op().is_relayed() { 9 } else { 3 };
            assert_eq!(command.caller_account_index(), expected, "{}", command.op().name());
        }
    }

    #[test]
    fn unused_fields_must_be_zero() {
        let mut raw = RawCommand::new(CommandOp::Deposit, 1, 2, 3);
        raw.word1 = word(1);
        assert_eq!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::NonZeroPadding { offset: WORD1_OFFSET })
        );

        let mut raw = RawCommand::new(CommandOp::FinalizeNft, 1, 2, 3);
        raw.word0 = word(1);
        assert_eq!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::NonZeroPadding { offset: WORD0_OFFSET })
        );

        let mut raw = RawCommand::new(CommandOp::AddPool, 1, 2, 3);
        raw.word1 = word(4);
        assert_eq!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::NonZeroPadding { offset: WORD1_OFFSET })
        );
    }

    #[test]
    fn impossible_indices_fail_at_decode() {
        let raw = RawCommand::new(CommandOp::Swap, 1, 2, 1 << 10);
        assert!(matches!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::Address(AddressError::OutOfRange { field: "pool", .. }))
        ));

        let raw = RawCommand::new(CommandOp::Deposit, 1, 1 << 20, 0);
        assert!(matches!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::Address(AddressError::OutOfRange { field: "account", .. }))
        ));

        let raw = RawCommand::new(CommandOp::AddPool, 1, 0, 1);
        assert!(matches!(
            Command::from_raw(&raw, 1 << 20),
            Err(DecodeError::Address(_))
        ));
    }

    #[test]
    fn pool_pair_needs_two_tokens() {
        let raw = RawCommand::new(CommandOp::AddPool, 1, 5, 5);
        assert_eq!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::SameToken { token: 5 })
        );
        assert!(Command::from_raw(&RawCommand::new(CommandOp::AddPool, 1, 5, 6), 0).is_ok());
    }

    #[test]
    fn non_canonical_amount_is_rejected() {
        let mut raw = RawCommand::new(CommandOp::Deposit, 1, 2, 3);
        raw.word0 = [0xff; 32];
        assert_eq!(
            Command::from_raw(&raw, 0),
            Err(DecodeError::NonCanonicalWord { offset: WORD0_OFFSET })
        );
    }

    #[test]
    fn decode_hex_accepts_prefixed_payload() {
        let buffer = sample_buffers()[5];
        let payload = format!("0x{}", hex::encode(buffer));
        let command = Command::decode_hex(&payload, 0).unwrap();
        assert_eq!(command.op(), CommandOp::Deposit);
        assert!(Command::decode_hex("0xabc", 0).is_err());
    }
}
