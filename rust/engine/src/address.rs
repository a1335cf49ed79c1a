//! Slot addressing: every leaf of the state tree is named by a [`SlotAddress`].
//!
//! A leaf index packs a 4-bit kind tag above a 32-bit payload, so the tree
//! height is fixed at [`TREE_HEIGHT`].

use serde::Serialize;

use crate::error::AddressError;

pub type AccountIndex = u32;
pub type TokenIndex = u32;
pub type PoolIndex = u32;
pub type NftIndex = u32;

pub const ACCOUNT_BITS: u32 = 20;
pub const TOKEN_BITS: u32 = 10;
pub const POOL_BITS: u32 = 10;
pub const NFT_BITS: u32 = 20;

const PAYLOAD_BITS: u32 = 32;
const KIND_BITS: u32 = 4;
pub const TREE_HEIGHT: usize = (PAYLOAD_BITS + KIND_BITS) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotAddress {
    Nonce { account: AccountIndex },
    Balance { account: AccountIndex, token: TokenIndex },
    PoolLiquidity { pool: PoolIndex },
    PoolSharePriceK { pool: PoolIndex },
    Share { account: AccountIndex, pool: PoolIndex },
    Nft { nft: NftIndex },
    PoolCount,
}

impl SlotAddress {
    fn kind_tag(&self) -> u64 {
        match self {
            SlotAddress::Nonce { .. } => 1,
            SlotAddress::Balance { .. } => 2,
            SlotAddress::PoolLiquidity { .. } => 3,
            SlotAddress::PoolSharePriceK { .. } => 4,
            SlotAddress::Share { .. } => 5,
            SlotAddress::Nft { .. } => 6,
            SlotAddress::PoolCount => 7,
        }
    }

    pub fn leaf_index(&self) -> Result<u64, AddressError> {
        let payload = match *self {
            SlotAddress::Nonce { account } => fit("account", account, ACCOUNT_BITS)?,
            SlotAddress::Balance { account, token } => {
                (fit("account", account, ACCOUNT_BITS)? << TOKEN_BITS)
                    | fit("token", token, TOKEN_BITS)?
            }
            SlotAddress::PoolLiquidity { pool } | SlotAddress::PoolSharePriceK { pool } => {
                fit("pool", pool, POOL_BITS)?
            }
            SlotAddress::Share { account, pool } => {
                let account = fit("account", account, ACCOUNT_BITS)?;
                (account << POOL_BITS) | fit("pool", pool, POOL_BITS)?
            }
            SlotAddress::Nft { nft } => fit("nft", nft, NFT_BITS)?,
            SlotAddress::PoolCount => 0,
        };
        Ok((self.kind_tag() << PAYLOAD_BITS) | payload)
    }
}

pub fn check_account(account: AccountIndex) -> Result<(), AddressError> {
    fit("account", account, ACCOUNT_BITS).map(|_| ())
}

pub fn check_token(token: TokenIndex) -> Result<(), AddressError> {
    fit("token", token, TOKEN_BITS).map(|_| ())
}

pub fn check_pool(pool: PoolIndex) -> Result<(), AddressError> {
    fit("pool", pool, POOL_BITS).map(|_| ())
}

pub fn check_nft(nft: NftIndex) -> Result<(), AddressError> {
    fit("nft", nft, NFT_BITS).map(|_| ())
}

fn fit(field: &'static str, value: u32, bits: u32) -> Result<u64, AddressError> {
    let value = u64::from(value);
    if value >> bits != 0 {
        return Err(AddressError::OutOfRange { field, value, bits });
    }
    Ok(value)
}
