//! NFT slots and the five commands that move them.
//!
//! A leaf is `[owner, bidder, bid_amount, reference]`. Bids are escrowed in
//! one configured token: placing a bid debits the bidder, a later bid
//! refunds the previous one, and finalizing pays the owner.

use starknet::core::types::Felt;

use crate::address::{AccountIndex, NftIndex, TokenIndex};
use crate::command::nonce_felt;
use crate::error::{DecodeError, StorageError};
use crate::merkle::{Leaf, NodeStore, EMPTY_LEAF};
use crate::storage::L2Storage;
use crate::utils::{felt_from_word, felt_to_u32, felt_to_word, negate};
use crate::wire::{CommandOp, RawCommand, WORD0_OFFSET};
use crate::witness::PathInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NftState {
    pub owner: Felt,
    pub bidder: Felt,
    pub bid_amount: Felt,
    pub reference: Felt,
}

impl NftState {
    pub fn from_leaf(leaf: &Leaf) -> Self {
        Self {
            owner: leaf[0],
            bidder: leaf[1],
            bid_amount: leaf[2],
            reference: leaf[3],
        }
    }

    pub fn to_leaf(&self) -> Leaf {
        [self.owner, self.bidder, self.bid_amount, self.reference]
    }

    pub fn has_bid(&self) -> bool {
        self.bid_amount != Felt::ZERO
    }

    fn bidder_index(&self, nft: NftIndex) -> Result<AccountIndex, StorageError> {
        felt_to_u32(&self.bidder).ok_or_else(|| {
            StorageError::Corrupt(format!("nft {nft} bidder is not an account index"))
        })
    }
}

pub struct Nft<'a, S> {
    storage: &'a mut L2Storage<S>,
    index: NftIndex,
}

impl<'a, S: NodeStore> Nft<'a, S> {
    pub fn new(storage: &'a mut L2Storage<S>, index: NftIndex) -> Self {
        Self { storage, index }
    }

    pub fn index(&self) -> NftIndex {
        self.index
    }

    pub async fn state(&self) -> Result<NftState, StorageError> {
        let leaf = self.storage.read_nft(self.index).await?;
        Ok(NftState::from_leaf(&leaf))
    }

    pub async fn get_and_update(&mut self, state: NftState) -> Result<PathInfo, StorageError> {
        self.storage.get_and_update_nft(self.index, state.to_leaf()).await
    }
}

/// Mints `nft` to `owner` after an L1 lock; operator-submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositNftCommand {
    pub nonce: u64,
    pub owner: AccountIndex,
    pub nft: NftIndex,
    pub l1_tx_hash: Felt,
    pub relayer: AccountIndex,
}

impl DepositNftCommand {
    pub(crate) fn decode(raw: &RawCommand, relayer: AccountIndex) -> Result<Self, DecodeError> {
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            owner: raw.index0,
            nft: raw.index1,
            l1_tx_hash: felt_from_word(&raw.word0, WORD0_OFFSET)?,
            relayer,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::DepositNft, self.nonce, self.owner, self.nft);
        raw.word0 = felt_to_word(&self.l1_tx_hash);
        raw
    }

    /// Paths: relayer nonce, nft.
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
        let state = NftState {
            owner: Felt::from(self.owner),
            reference: self.l1_tx_hash,
            ..NftState::default()
        };
        paths.push(storage.nft(self.nft).get_and_update(state).await?);
        Ok(paths)
    }
}

/// Burns `nft` for release to `l1_account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawNftCommand {
    pub nonce: u64,
    pub caller: AccountIndex,
    pub nft: NftIndex,
    pub l1_account: Felt,
}

impl WithdrawNftCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            caller: raw.index0,
            nft: raw.index1,
            l1_account: felt_from_word(&raw.word0, WORD0_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::WithdrawNft, self.nonce, self.caller, self.nft);
        raw.word0 = felt_to_word(&self.l1_account);
        raw
    }

    /// Paths: nonce, nft, then the bidder's refund when a bid is open.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
        bid_token: TokenIndex,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let previous = storage.nft(self.nft).state().await?;
        let refund = if previous.has_bid() {
            Some((previous.bidder_index(self.nft)?, previous.bid_amount))
        } else {
            None
        };

        let mut paths = Vec::with_capacity(3);
        paths.push(
            storage
                .get_and_update_nonce(self.caller, nonce_felt(self.nonce))
                .await?,
        );
        paths.push(storage.get_and_update_nft(self.nft, EMPTY_LEAF).await?);
        if let Some((bidder, amount)) = refund {
            paths.push(storage.get_and_add_balance(bidder, bid_token, amount).await?);
        }
        Ok(paths)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNftCommand {
    pub nonce: u64,
    pub caller: AccountIndex,
    pub nft: NftIndex,
    pub owner: Felt,
}

impl TransferNftCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            caller: raw.index0,
            nft: raw.index1,
            owner: felt_from_word(&raw.word0, WORD0_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::TransferNft, self.nonce, self.caller, self.nft);
        raw.word0 = felt_to_word(&self.owner);
        raw
    }

    /// Paths: nonce, nft. An open bid stays attached to the token.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let mut paths = Vec::with_capacity(2);
        paths.push(
            storage
                .get_and_update_nonce(self.caller, nonce_felt(self.nonce))
                .await?,
        );
        let mut nft = storage.nft(self.nft);
        let state = NftState {
            owner: self.owner,
            ..nft.state().await?
        };
        paths.push(nft.get_and_update(state).await?);
        Ok(paths)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidNftCommand {
    pub nonce: u64,
    pub caller: AccountIndex,
    pub nft: NftIndex,
    pub amount: Felt,
}

impl BidNftCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            caller: raw.index0,
            nft: raw.index1,
            amount: felt_from_word(&raw.word0, WORD0_OFFSET)?,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        let mut raw = RawCommand::new(CommandOp::BidNft, self.nonce, self.caller, self.nft);
        raw.word0 = felt_to_word(&self.amount);
        raw
    }

    /// Paths: nonce, nft, refund of the previous bidder (only if a bid is
    /// open), charge of the caller. A caller raising its own bid gets one
    /// merged balance path.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
        bid_token: TokenIndex,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let previous = storage.nft(self.nft).state().await?;
        let refund_to = if previous.has_bid() {
            Some(previous.bidder_index(self.nft)?)
        } else {
            None
        };

        let mut paths = Vec::with_capacity(4);
        paths.push(
            storage
                .get_and_update_nonce(self.caller, nonce_felt(self.nonce))
                .await?,
        );
        let state = NftState {
            bidder: Felt::from(self.caller),
            bid_amount: self.amount,
            ..previous
        };
        paths.push(storage.nft(self.nft).get_and_update(state).await?);

        let charge = negate(self.amount);
        match refund_to {
            Some(bidder) if bidder == self.caller => {
                paths.push(
                    storage
                        .get_and_add_balance(self.caller, bid_token, previous.bid_amount + charge)
                        .await?,
                );
            }
            Some(bidder) => {
                paths.push(
                    storage
                        .get_and_add_balance(bidder, bid_token, previous.bid_amount)
                        .await?,
                );
                paths.push(
                    storage
                        .get_and_add_balance(self.caller, bid_token, charge)
                        .await?,
                );
            }
            None => {
                paths.push(
                    storage
                        .get_and_add_balance(self.caller, bid_token, charge)
                        .await?,
                );
            }
        }
        Ok(paths)
    }
}

/// Accepts the open bid: the bidder becomes owner and the caller is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeNftCommand {
    pub nonce: u64,
    pub caller: AccountIndex,
    pub nft: NftIndex,
}

impl FinalizeNftCommand {
    pub(crate) fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        raw.expect_unused_word0()?;
        raw.expect_unused_word1()?;
        Ok(Self {
            nonce: raw.nonce,
            caller: raw.index0,
            nft: raw.index1,
        })
    }

    pub(crate) fn encode(&self) -> RawCommand {
        RawCommand::new(CommandOp::FinalizeNft, self.nonce, self.caller, self.nft)
    }

    /// Paths: nonce, nft, caller balance.
    pub async fn run<S: NodeStore>(
        &self,
        storage: &mut L2Storage<S>,
        bid_token: TokenIndex,
    ) -> Result<Vec<PathInfo>, StorageError> {
        let mut paths = Vec::with_capacity(3);
        paths.push(
            storage
                .get_and_update_nonce(self.caller, nonce_felt(self.nonce))
                .await?,
        );
        let mut nft = storage.nft(self.nft);
        let previous = nft.state().await?;
        let state = NftState {
            owner: previous.bidder,
            reference: previous.reference,
            ..NftState::default()
        };
        paths.push(nft.get_and_update(state).await?);
        paths.push(
            storage
                .get_and_add_balance(self.caller, bid_token, previous.bid_amount)
                .await?,
        );
        Ok(paths)
    }
}
