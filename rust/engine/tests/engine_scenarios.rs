use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use starknet::core::types::Felt;

use l2_engine::{
    felt_to_word, negate, verify_path, AccountIndex, Command, CommandOp, DecodeError, Engine,
    EngineConfig, EngineError, MemoryNodeStore, PathInfo, RawCommand, SlotAddress, StorageError,
    COMMAND_LEN, TREE_HEIGHT,
};

const RELAYER: AccountIndex = 0;

async fn engine() -> Engine<MemoryNodeStore> {
    Engine::in_memory(EngineConfig::default()).await.unwrap()
}

fn raw(op: CommandOp, nonce: u64, index0: u32, index1: u32, word0: u64, word1: u64) -> RawCommand {
    let mut raw = RawCommand::new(op, nonce, index0, index1);
    raw.word0 = felt_to_word(&Felt::from(word0));
    raw.word1 = felt_to_word(&Felt::from(word1));
    raw
}

async fn run(
    engine: &mut Engine<MemoryNodeStore>,
    raw: RawCommand,
    relayer: AccountIndex,
) -> Vec<PathInfo> {
    let (_, paths) = engine.execute_wire(&raw.encode(), relayer).await.unwrap();
    paths
}

fn addresses(paths: &[PathInfo]) -> Vec<SlotAddress> {
    paths.iter().map(|path| path.address).collect()
}

/// Pool 0 trading token 0 against token 1.
async fn engine_with_pool(liquidity0: u64, liquidity1: u64) -> Engine<MemoryNodeStore> {
    let mut engine = engine().await;
    run(&mut engine, raw(CommandOp::AddPool, 1, 0, 1, 0, 0), RELAYER).await;
    engine
        .storage_mut()
        .get_and_add_liq(0, Felt::from(liquidity0), Felt::from(liquidity1))
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn deposit_scenario() {
    let mut engine = engine().await;
    let storage = engine.storage_mut();
    storage.get_and_update_nonce(3, Felt::from(4u8)).await.unwrap();
    storage.get_and_add_balance(3, 1, Felt::from(50u8)).await.unwrap();

    let paths = run(&mut engine, raw(CommandOp::Deposit, 5, 3, 1, 100, 0), 3).await;

    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 3 },
            SlotAddress::Balance { account: 3, token: 1 },
        ]
    );
    assert_eq!(paths[0].old_leaf[0], Felt::from(4u8));
    assert_eq!(paths[0].new_leaf[0], Felt::from(5u8));
    assert_eq!(paths[1].old_leaf[0], Felt::from(50u8));
    assert_eq!(paths[1].new_leaf[0], Felt::from(150u8));
    assert_eq!(engine.storage().read_balance(3, 1).await.unwrap(), Felt::from(150u8));
}

#[tokio::test]
async fn swap_scenario() {
    let mut engine = engine_with_pool(1000, 1000).await;
    let storage = engine.storage_mut();
    storage.get_and_add_balance(2, 0, Felt::from(100u8)).await.unwrap();
    storage.get_and_add_balance(2, 1, Felt::from(100u8)).await.unwrap();

    let paths = run(&mut engine, raw(CommandOp::Swap, 1, 2, 0, 0, 10), RELAYER).await;

    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 2 },
            SlotAddress::PoolLiquidity { pool: 0 },
            SlotAddress::Balance { account: 2, token: 0 },
            SlotAddress::Balance { account: 2, token: 1 },
        ]
    );
    let pool = engine.storage().read_pool(0).await.unwrap();
    assert_eq!(pool.liquidity0, Felt::from(1010u32));
    assert_eq!(pool.liquidity1, Felt::from(991u32));
    assert_eq!(engine.storage().read_share_price_k(0).await.unwrap(), Felt::ONE);
    assert_eq!(engine.storage().read_balance(2, 0).await.unwrap(), Felt::from(90u8));
    assert_eq!(engine.storage().read_balance(2, 1).await.unwrap(), Felt::from(111u8));
}

#[tokio::test]
async fn reverse_swap_inverts_roles() {
    let mut engine = engine_with_pool(1000, 1000).await;
    let paths = run(&mut engine, raw(CommandOp::Swap, 1, 2, 0, 1, 10), RELAYER).await;
    assert_eq!(paths[2].new_leaf[0], Felt::from(11u8));
    assert_eq!(paths[3].new_leaf[0], negate(Felt::from(10u8)));
    let pool = engine.storage().read_pool(0).await.unwrap();
    assert_eq!(pool.liquidity0, Felt::from(991u32));
    assert_eq!(pool.liquidity1, Felt::from(1010u32));
}

#[tokio::test]
async fn every_variant_emits_its_documented_sequence() {
    let mut engine = engine().await;

    let paths = run(&mut engine, raw(CommandOp::AddPool, 1, 0, 1, 0, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: RELAYER },
            SlotAddress::PoolCount,
            SlotAddress::PoolLiquidity { pool: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::Deposit, 2, 4, 0, 500, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: RELAYER },
            SlotAddress::Balance { account: 4, token: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::Supply, 1, 4, 0, 200, 300), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 4 },
            SlotAddress::PoolLiquidity { pool: 0 },
            SlotAddress::Balance { account: 4, token: 0 },
            SlotAddress::Balance { account: 4, token: 1 },
            SlotAddress::Share { account: 4, pool: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::Retrieve, 2, 4, 0, 20, 30), RELAYER).await;
    assert_eq!(paths.len(), 5);
    assert_eq!(paths[4].address, SlotAddress::Share { account: 4, pool: 0 });
    assert_eq!(paths[4].new_leaf[0], Felt::from(450u32));

    let paths = run(&mut engine, raw(CommandOp::Swap, 3, 4, 0, 0, 10), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 4 },
            SlotAddress::PoolLiquidity { pool: 0 },
            SlotAddress::Balance { account: 4, token: 0 },
            SlotAddress::Balance { account: 4, token: 1 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::Withdraw, 4, 4, 0, 10, 0xabc), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 4 },
            SlotAddress::Balance { account: 4, token: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::DepositNft, 3, 4, 9, 0xfeed, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![SlotAddress::Nonce { account: RELAYER }, SlotAddress::Nft { nft: 9 }]
    );

    let paths = run(&mut engine, raw(CommandOp::BidNft, 1, 6, 9, 40, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 6 },
            SlotAddress::Nft { nft: 9 },
            SlotAddress::Balance { account: 6, token: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::BidNft, 1, 7, 9, 60, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 7 },
            SlotAddress::Nft { nft: 9 },
            SlotAddress::Balance { account: 6, token: 0 },
            SlotAddress::Balance { account: 7, token: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::FinalizeNft, 4, 4, 9, 0, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 4 },
            SlotAddress::Nft { nft: 9 },
            SlotAddress::Balance { account: 4, token: 0 },
        ]
    );

    let paths = run(&mut engine, raw(CommandOp::TransferNft, 2, 7, 9, 8, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![SlotAddress::Nonce { account: 7 }, SlotAddress::Nft { nft: 9 }]
    );

    let paths = run(&mut engine, raw(CommandOp::WithdrawNft, 1, 8, 9, 0x123, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![SlotAddress::Nonce { account: 8 }, SlotAddress::Nft { nft: 9 }]
    );

    assert_eq!(engine.executed(), 12);
}

fn random_command(rng: &mut StdRng, nonce: u64) -> (RawCommand, AccountIndex) {
    let account = rng.gen_range(1..16u32);
    let amount = rng.gen_range(1..10_000u64);
    let nft = rng.gen_range(0..4u32);
    match rng.gen_range(0..9u8) {
        0 => (raw(CommandOp::Deposit, nonce, account, rng.gen_range(0..2), amount, 0), RELAYER),
        1 => (raw(CommandOp::Withdraw, nonce, account, rng.gen_range(0..2), amount, 7), RELAYER),
        2 => (raw(CommandOp::Swap, nonce, account, 0, rng.gen_range(0..2), amount), RELAYER),
        3 => (raw(CommandOp::Supply, nonce, account, 0, amount, amount / 2), RELAYER),
        4 => (raw(CommandOp::Retrieve, nonce, account, 0, amount / 4, amount / 8), RELAYER),
        5 => (raw(CommandOp::DepositNft, nonce, account, nft, amount, 0), RELAYER),
        6 => (raw(CommandOp::BidNft, nonce, account, nft, amount, 0), RELAYER),
        7 => (raw(CommandOp::TransferNft, nonce, account, nft, u64::from(account + 1), 0), RELAYER),
        _ => (raw(CommandOp::FinalizeNft, nonce, account, nft, 0, 0), RELAYER),
    }
}

async fn replay(seed: u64) -> (Vec<Vec<PathInfo>>, Felt) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut engine = engine_with_pool(50_000, 50_000).await;
    let mut witnesses = Vec::new();
    for nonce in 1..=60u64 {
        let (raw, relayer) = random_command(&mut rng, nonce);
        witnesses.push(run(&mut engine, raw, relayer).await);
    }
    (witnesses, engine.root())
}

#[tokio::test]
async fn identical_prestate_and_commands_give_identical_witnesses() {
    let (first, first_root) = replay(7).await;
    let (second, second_root) = replay(7).await;
    assert_eq!(first, second);
    assert_eq!(first_root, second_root);
}

#[tokio::test]
async fn witnesses_chain_and_verify_against_roots() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut engine = engine_with_pool(50_000, 50_000).await;
    let mut expected_root = engine.root();
    for nonce in 1..=40u64 {
        let (raw, relayer) = random_command(&mut rng, nonce);
        let command = Command::decode(&raw.encode(), relayer).unwrap();
        let gap = command.witness_gap();
        for (slot, path) in run(&mut engine, raw, relayer).await.into_iter().enumerate() {
            if gap == Some(slot) {
                assert_ne!(path.root_before, expected_root);
                expected_root = path.root_before;
            }
            assert_eq!(path.siblings.len(), TREE_HEIGHT);
            assert_eq!(path.root_before, expected_root);
            assert!(verify_path(&path.old_leaf, path.leaf_index, &path.siblings, path.root_before));
            assert!(verify_path(&path.new_leaf, path.leaf_index, &path.siblings, path.root_after));
            expected_root = path.root_after;
        }
    }
    assert_eq!(engine.root(), expected_root);
}

#[test]
fn decode_then_encode_reproduces_every_opcode() {
    let mut rng = StdRng::seed_from_u64(3);
    for op in CommandOp::ALL {
        for _ in 0..16 {
            let index0 = rng.gen_range(0..1u32 << 10);
            let mut index1 = rng.gen_range(0..1u32 << 10);
            if op == CommandOp::AddPool && index1 == index0 {
                index1 = (index0 + 1) % (1 << 10);
            }
            let mut raw = RawCommand::new(op, rng.gen(), index0, index1);
            let word_count = match op {
                CommandOp::AddPool | CommandOp::FinalizeNft => 0,
                CommandOp::Deposit
                | CommandOp::DepositNft
                | CommandOp::WithdrawNft
                | CommandOp::TransferNft
                | CommandOp::BidNft => 1,
                _ => 2,
            };
            if word_count >= 1 {
                raw.word0 = felt_to_word(&Felt::from(rng.gen::<u128>()));
            }
            if word_count == 2 {
                raw.word1 = felt_to_word(&Felt::from(rng.gen::<u128>()));
            }
            let bytes = raw.encode();
            let command = Command::decode(&bytes, RELAYER).unwrap();
            assert_eq!(command.encode(), bytes, "{}", op.name());
        }
    }
}

#[tokio::test]
async fn contract_violations_never_reach_storage() {
    let mut engine = engine().await;
    let root = engine.root();

    let short = [6u8; COMMAND_LEN - 1];
    assert!(matches!(
        engine.execute_wire(&short, RELAYER).await,
        Err(EngineError::Decode(DecodeError::Length { .. }))
    ));

    let mut unknown = raw(CommandOp::Deposit, 1, 1, 1, 1, 0).encode();
    unknown[0] = 0;
    assert!(matches!(
        engine.execute_wire(&unknown, RELAYER).await,
        Err(EngineError::Decode(DecodeError::UnknownOpcode(0)))
    ));

    let impossible = raw(CommandOp::Withdraw, 1, 1 << 20, 0, 1, 0).encode();
    assert!(matches!(
        engine.execute_wire(&impossible, RELAYER).await,
        Err(EngineError::Decode(DecodeError::Address(_)))
    ));

    assert_eq!(engine.root(), root);
    assert_eq!(engine.executed(), 0);
}

#[tokio::test]
async fn no_command_touches_a_slot_twice() {
    let mut rng = StdRng::seed_from_u64(19);
    let mut engine = engine_with_pool(50_000, 50_000).await;
    for nonce in 1..=60u64 {
        let (raw, relayer) = random_command(&mut rng, nonce);
        let paths = run(&mut engine, raw, relayer).await;
        let distinct: HashSet<u64> = paths.iter().map(|path| path.leaf_index).collect();
        assert_eq!(distinct.len(), paths.len(), "{:?}", addresses(&paths));
    }
}

#[tokio::test]
async fn pool_commands_on_unregistered_pool_are_refused() {
    let mut engine = engine_with_pool(1000, 1000).await;
    let root = engine.root();
    let executed = engine.executed();

    for op in [CommandOp::Swap, CommandOp::Supply, CommandOp::Retrieve] {
        let command = raw(op, 1, 2, 3, 10, 10).encode();
        assert!(
            matches!(
                engine.execute_wire(&command, RELAYER).await,
                Err(EngineError::Storage(StorageError::UnregisteredPool(3)))
            ),
            "{}",
            op.name()
        );
    }

    let same_pair = raw(CommandOp::AddPool, 2, 4, 4, 0, 0).encode();
    assert!(matches!(
        engine.execute_wire(&same_pair, RELAYER).await,
        Err(EngineError::Decode(DecodeError::SameToken { token: 4 }))
    ));

    assert_eq!(engine.root(), root);
    assert_eq!(engine.executed(), executed);
}

#[tokio::test]
async fn withdrawing_a_bid_on_nft_refunds_the_bidder() {
    let mut engine = engine().await;
    run(&mut engine, raw(CommandOp::DepositNft, 1, 3, 5, 0xfeed, 0), RELAYER).await;
    run(&mut engine, raw(CommandOp::BidNft, 1, 6, 5, 40, 0), RELAYER).await;
    let paths = run(&mut engine, raw(CommandOp::WithdrawNft, 1, 3, 5, 0x123, 0), RELAYER).await;
    assert_eq!(
        addresses(&paths),
        vec![
            SlotAddress::Nonce { account: 3 },
            SlotAddress::Nft { nft: 5 },
            SlotAddress::Balance { account: 6, token: 0 },
        ]
    );
    assert_eq!(engine.storage().read_balance(6, 0).await.unwrap(), Felt::ZERO);
}
