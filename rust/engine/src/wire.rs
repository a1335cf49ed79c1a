//! Fixed 81-byte command buffer shared with the signer.
//!
//! ```text
//! 0:1 opcode | 1:8 nonce | 9:4 index0 | 13:4 index1 | 17:32 word0 | 49:32 word1
//! ```
//! All integers are big-endian; fields an opcode does not use are zero.

use crate::error::DecodeError;
use crate::utils::Word;

pub const COMMAND_LEN: usize = 81;

pub const OP_OFFSET: usize = 0;
pub const NONCE_OFFSET: usize = 1;
pub const INDEX0_OFFSET: usize = 9;
pub const INDEX1_OFFSET: usize = 13;
pub const WORD0_OFFSET: usize = 17;
pub const WORD1_OFFSET: usize = 49;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOp {
    AddPool = 1,
    Withdraw = 2,
    Swap = 3,
    Supply = 4,
    Retrieve = 5,
    Deposit = 6,
    DepositNft = 7,
    WithdrawNft = 8,
    TransferNft = 9,
    BidNft = 10,
    FinalizeNft = 11,
}

impl CommandOp {
    pub const ALL: [CommandOp; 11] = [
        CommandOp::AddPool,
        CommandOp::Withdraw,
        CommandOp::Swap,
        CommandOp::Supply,
        CommandOp::Retrieve,
        CommandOp::Deposit,
        CommandOp::DepositNft,
        CommandOp::WithdrawNft,
        CommandOp::TransferNft,
        CommandOp::BidNft,
        CommandOp::FinalizeNft,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CommandOp::AddPool => "add_pool",
            CommandOp::Withdraw => "withdraw",
            CommandOp::Swap => "swap",
            CommandOp::Supply => "supply",
            CommandOp::Retrieve => "retrieve",
            CommandOp::Deposit => "deposit",
            CommandOp::DepositNft => "deposit_nft",
            CommandOp::WithdrawNft => "withdraw_nft",
            CommandOp::TransferNft => "transfer_nft",
            CommandOp::BidNft => "bid_nft",
            CommandOp::FinalizeNft => "finalize_nft",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Submitted by the operator; the caller index travels outside the buffer.
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            CommandOp::AddPool | CommandOp::Deposit | CommandOp::DepositNft
        )
    }
}

impl TryFrom<u8> for CommandOp {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|op| *op as u8 == value)
            .ok_or(DecodeError::UnknownOpcode(value))
    }
}

/// Untyped view of a buffer: every field split out, nothing interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCommand {
    pub op: CommandOp,
    pub nonce: u64,
    pub index0: u32,
    pub index1: u32,
    pub word0: Word,
    pub word1: Word,
}

impl RawCommand {
    pub fn new(op: CommandOp, nonce: u64, index0: u32, index1: u32) -> Self {
        Self {
            op,
            nonce,
            index0,
            index1,
            word0: [0u8; 32],
            word1: [0u8; 32],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != COMMAND_LEN {
            return Err(DecodeError::Length {
                expected: COMMAND_LEN,
                got: bytes.len(),
            });
        }
        let op = CommandOp::try_from(bytes[OP_OFFSET])?;
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&bytes[NONCE_OFFSET..INDEX0_OFFSET]);
        let mut index0 = [0u8; 4];
        index0.copy_from_slice(&bytes[INDEX0_OFFSET..INDEX1_OFFSET]);
        let mut index1 = [0u8; 4];
        index1.copy_from_slice(&bytes[INDEX1_OFFSET..WORD0_OFFSET]);
        let mut word0 = [0u8; 32];
        word0.copy_from_slice(&bytes[WORD0_OFFSET..WORD1_OFFSET]);
        let mut word1 = [0u8; 32];
        word1.copy_from_slice(&bytes[WORD1_OFFSET..COMMAND_LEN]);
        Ok(Self {
            op,
            nonce: u64::from_be_bytes(nonce),
            index0: u32::from_be_bytes(index0),
            index1: u32::from_be_bytes(index1),
            word0,
            word1,
        })
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut buf = [0u8; COMMAND_LEN];
        buf[OP_OFFSET] = self.op as u8;
        buf[NONCE_OFFSET..INDEX0_OFFSET].copy_from_slice(&self.nonce.to_be_bytes());
        buf[INDEX0_OFFSET..INDEX1_OFFSET].copy_from_slice(&self.index0.to_be_bytes());
        buf[INDEX1_OFFSET..WORD0_OFFSET].copy_from_slice(&self.index1.to_be_bytes());
        buf[WORD0_OFFSET..WORD1_OFFSET].copy_from_slice(&self.word0);
        buf[WORD1_OFFSET..COMMAND_LEN].copy_from_slice(&self.word1);
        buf
    }

    pub fn expect_unused_word0(&self) -> Result<(), DecodeError> {
        if self.word0 != [0u8; 32] {
            return Err(DecodeError::NonZeroPadding { offset: WORD0_OFFSET });
        }
        Ok(())
    }

    pub fn expect_unused_word1(&self) -> Result<(), DecodeError> {
        if self.word1 != [0u8; 32] {
            return Err(DecodeError::NonZeroPadding { offset: WORD1_OFFSET });
        }
        Ok(())
    }
}
