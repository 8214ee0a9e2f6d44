//! End-to-end tests: mining, spending, fork resolution and recovery
//! against a live chain manager.

use utxo_chain::consensus::fork::{self, OrphanPool};
use utxo_chain::consensus::pow::{self, CancelToken};
use utxo_chain::core::chain::{ChainError, ChainManager};
use utxo_chain::core::transaction::{OutPoint, Transaction, TxInput, TxOutput};
use utxo_chain::mining::{build_coinbase, Miner};
use utxo_chain::Block;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Mine a child block directly on `prev`, outside any manager.
fn mine_child(prev: &Block, miner: &str, extra: Vec<Transaction>, difficulty: u32) -> Block {
    let height = prev.index + 1;
    let mut transactions = vec![build_coinbase(miner, height)];
    transactions.extend(extra);

    let mut block = Block::new(height, prev.hash.clone(), transactions, difficulty);
    let nonce = pow::search(&block, &CancelToken::new()).expect("search not cancelled");
    block.nonce = nonce;
    block.hash = block.header_hash();
    block
}

#[test]
fn test_coinbase_then_spend_flow() {
    init_logging();
    let mut chain = ChainManager::new(1);
    let alice = Miner::new("alice");

    let (block, _) = alice
        .mine(&chain.snapshot(), &[], chain.ledger(), &CancelToken::new())
        .unwrap();
    let coinbase_id = block.transactions[0].id.clone();
    chain.append(block).unwrap();

    assert_eq!(chain.ledger().len(), 1);
    assert_eq!(chain.ledger().balance("alice"), 50);

    // alice splits her reward between bob and carol, no fee
    let spend = Transaction::new(
        vec![TxInput::new(&coinbase_id, 0, "alice")],
        vec![TxOutput::new(30, "bob"), TxOutput::new(20, "carol")],
    );
    assert_eq!(chain.admit_transaction(&spend).unwrap(), 0);

    let miner = Miner::new("miner");
    let (block, _) = miner
        .mine(
            &chain.snapshot(),
            std::slice::from_ref(&spend),
            chain.ledger(),
            &CancelToken::new(),
        )
        .unwrap();
    chain.append(block).unwrap();

    assert_eq!(chain.height(), 2);
    assert_eq!(chain.ledger().balance("alice"), 0);
    assert_eq!(chain.ledger().balance("bob"), 30);
    assert_eq!(chain.ledger().balance("carol"), 20);
    assert_eq!(chain.ledger().balance("miner"), 50);
    assert!(!chain.ledger().contains(&OutPoint::new(&coinbase_id, 0)));
}

#[test]
fn test_stranger_cannot_spend_coinbase() {
    let mut chain = ChainManager::new(1);
    let alice = Miner::new("alice");

    let (block, _) = alice
        .mine(&chain.snapshot(), &[], chain.ledger(), &CancelToken::new())
        .unwrap();
    let coinbase_id = block.transactions[0].id.clone();
    chain.append(block).unwrap();

    let theft = Transaction::new(
        vec![TxInput::new(&coinbase_id, 0, "mallory")],
        vec![TxOutput::new(50, "mallory")],
    );
    assert!(chain.admit_transaction(&theft).is_err());
}

#[test]
fn test_fork_resolution_prefers_cumulative_work() {
    init_logging();
    let mut chain = ChainManager::new(1);
    let genesis = chain.blocks()[0].clone();

    // active branch: two blocks of difficulty 1 (work 3 with genesis)
    let a1 = mine_child(&genesis, "a", Vec::new(), 1);
    let a2 = mine_child(&a1, "a", Vec::new(), 1);
    chain.append(a1).unwrap();
    chain.append(a2).unwrap();

    // rival branch: two blocks of difficulty 2 (work 5)
    let b1 = mine_child(&genesis, "b", Vec::new(), 2);
    let b2 = mine_child(&b1, "b", Vec::new(), 2);
    let rival = vec![genesis, b1, b2.clone()];

    let outcome = fork::reorganize(&mut chain, &rival).unwrap();
    assert_eq!(outcome.disconnected, 2);
    assert_eq!(outcome.connected, 2);
    assert_eq!(chain.tip().hash, b2.hash);

    // the ledger follows the switch
    assert_eq!(chain.ledger().balance("a"), 0);
    assert_eq!(chain.ledger().balance("b"), 100);
    assert_eq!(chain.work(), 5);
}

#[test]
fn test_reorg_refused_for_equal_work() {
    let mut chain = ChainManager::new(1);
    let genesis = chain.blocks()[0].clone();

    let a1 = mine_child(&genesis, "a", Vec::new(), 1);
    chain.append(a1.clone()).unwrap();

    let b1 = mine_child(&genesis, "b", Vec::new(), 1);
    let rival = vec![genesis, b1];

    assert!(fork::reorganize(&mut chain, &rival).is_err());
    assert_eq!(chain.tip().hash, a1.hash);
    assert_eq!(chain.ledger().balance("a"), 50);
}

#[test]
fn test_out_of_order_arrival_via_orphan_pool() {
    let mut chain = ChainManager::new(1);
    let genesis = chain.blocks()[0].clone();

    let b1 = mine_child(&genesis, "m", Vec::new(), 1);
    let b2 = mine_child(&b1, "m", Vec::new(), 1);
    let b3 = mine_child(&b2, "m", Vec::new(), 1);

    // children arrive before their parent
    let mut pool = OrphanPool::new();
    for block in [b3, b2] {
        match chain.append(block.clone()) {
            Err(ChainError::UnknownParent { .. }) => assert!(pool.insert(block)),
            other => panic!("expected orphan, got {:?}", other),
        }
    }

    chain.append(b1).unwrap();
    let attached = fork::reattach_orphans(&mut chain, &mut pool);
    assert_eq!(attached, 2);
    assert_eq!(chain.height(), 3);
    assert!(pool.is_empty());
}

#[test]
fn test_rebuild_ledger_matches_incremental_state() {
    let mut chain = ChainManager::new(1);
    let miner = Miner::new("miner");

    let (block, _) = miner
        .mine(&chain.snapshot(), &[], chain.ledger(), &CancelToken::new())
        .unwrap();
    let coinbase_id = block.transactions[0].id.clone();
    chain.append(block).unwrap();

    let spend = Transaction::new(
        vec![TxInput::new(&coinbase_id, 0, "miner")],
        vec![TxOutput::new(45, "payee"), TxOutput::new(5, "miner")],
    );
    let (block, _) = miner
        .mine(
            &chain.snapshot(),
            std::slice::from_ref(&spend),
            chain.ledger(),
            &CancelToken::new(),
        )
        .unwrap();
    chain.append(block).unwrap();

    let replayed = chain.rebuild_ledger().unwrap();
    assert_eq!(&replayed, chain.ledger());
    chain.verify_ledger().unwrap();
}

#[test]
fn test_blocks_serde_round_trip() {
    let mut chain = ChainManager::new(1);
    let miner = Miner::new("miner");
    for _ in 0..2 {
        let (block, _) = miner
            .mine(&chain.snapshot(), &[], chain.ledger(), &CancelToken::new())
            .unwrap();
        chain.append(block).unwrap();
    }

    let encoded = serde_json::to_string(chain.blocks()).unwrap();
    let decoded: Vec<Block> = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, chain.blocks());
}
