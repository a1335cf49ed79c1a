//! L2 state-transition engine: decodes signed command buffers, applies them to
//! a Poseidon Merkle state tree and returns one witness per mutated leaf.

mod account;
mod address;
mod command;
mod deposit;
mod engine;
mod error;
mod liquidity;
mod merkle;
mod nft;
mod pool;
mod share_calc;
mod storage;
mod swap;
mod utils;
mod wire;
mod withdraw;
mod witness;

pub use account::Account;
pub use address::{
    check_account, check_nft, check_pool, check_token, AccountIndex, NftIndex, PoolIndex,
    SlotAddress, TokenIndex, ACCOUNT_BITS, NFT_BITS, POOL_BITS, TOKEN_BITS, TREE_HEIGHT,
};
pub use command::{Command, ExecutionContext};
pub use deposit::DepositCommand;
pub use engine::{Engine, EngineConfig};
pub use error::{AddressError, DecodeError, EngineError, StorageError};
pub use liquidity::{AddPoolCommand, LiquidityCommand};
pub use merkle::{
    compute_root, hash_leaf, verify_path, Leaf, LeafUpdate, MemoryNodeStore, MerkleTree,
    NodeStore, EMPTY_LEAF, LEAF_WIDTH,
};
pub use nft::{
    BidNftCommand, DepositNftCommand, FinalizeNftCommand, Nft, NftState, TransferNftCommand,
    WithdrawNftCommand,
};
pub use pool::Pool;
pub use share_calc::{ShareCalcHelper, PROFIT_RATE_DENOMINATOR, PROFIT_RATE_NUMERATOR};
pub use storage::{L2Storage, PoolState};
pub use swap::{SwapCommand, SwapDeltas};
pub use utils::{
    bytes_to_hex, felt_from_word, felt_to_decimal, felt_to_hex, felt_to_u32, felt_to_word,
    hex_to_bytes, negate, parse_felt, Word,
};
pub use wire::{CommandOp, RawCommand, COMMAND_LEN};
pub use witness::{command_to_json, execution_to_json, path_to_json, paths_to_json, PathInfo};
