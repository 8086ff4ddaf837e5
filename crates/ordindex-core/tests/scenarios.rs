//! End-to-end scenarios against an on-disk store.
//!
//! Each test drives the indexer the way the external block store does:
//! `open` → `on_start_read_from_db` → `on_read_from_db`* →
//! `on_db_read_finished`, then live `update` / `on_remove_block` calls, and
//! observes results through the query surface.

use std::sync::{Arc, Mutex};

use ordindex_core::{
    Address, Block, CheckpointFile, IndexerConfig, OrdinalIndexer, Transaction, TxPosition,
    UserField,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn addr(byte: u8) -> Address {
    Address::from_public_key([byte; 32])
}

fn inscribe(source: Address, target: Address, payload: &str) -> Transaction {
    Transaction::new(source, target).with_field(1000, UserField::Text(payload.into()))
}

fn block(height: u64, txs: Vec<Transaction>) -> Block {
    let mut block = Block::new(height);
    for tx in txs {
        block = block.with_transaction(tx);
    }
    block
}

/// Open the indexer in `dir` and run an (empty) cold replay so it is live.
fn open_live(dir: &std::path::Path) -> OrdinalIndexer {
    let mut indexer = OrdinalIndexer::open(IndexerConfig::new(dir)).unwrap();
    indexer.on_start_read_from_db(0);
    indexer.on_db_read_finished();
    indexer
}

// ─── Scenario 1 + 4: register / transfer cycle, then reorg rollback ──────────

#[test]
fn register_transfer_update_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (a, b) = (addr(1), addr(2));

    indexer.update(&block(
        10,
        vec![inscribe(a, a, r#"{"p":"cns","op":"reg","cns":"Alice","relay":"ipfs://x"}"#)],
    ));
    indexer.update(&block(11, vec![inscribe(a, b, r#"{"p":"cns","op":"trf","cns":"alice"}"#)]));
    indexer.update(&block(
        12,
        vec![inscribe(b, b, r#"{"p":"cns","op":"upd","cns":"ALICE","relay":"ipfs://y"}"#)],
    ));

    let query = indexer.query_handle();
    let record = query.cns_by_name("cns", "alice").unwrap();
    assert_eq!(record.owner, b);
    assert_eq!(record.relay, "ipfs://y");
    assert_eq!(record.registered_at, TxPosition::new(10, 0));
    assert!(!query.cns_available("cns", "Alice"));
    assert_eq!(indexer.last_indexed(), 12);
}

#[test]
fn reorg_rolls_back_through_registration() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (a, b) = (addr(1), addr(2));

    let b10 = block(
        10,
        vec![inscribe(a, a, r#"{"p":"cns","op":"reg","cns":"Alice","relay":"ipfs://x"}"#)],
    );
    let b11 = block(11, vec![inscribe(a, b, r#"{"p":"cns","op":"trf","cns":"alice"}"#)]);
    let b12 = block(
        12,
        vec![inscribe(b, b, r#"{"p":"cns","op":"upd","cns":"ALICE","relay":"ipfs://y"}"#)],
    );
    indexer.update(&b10);
    indexer.update(&b11);
    indexer.update(&b12);

    let query = indexer.query_handle();

    // Undo the update: owner still B, relay back to the registration value.
    indexer.on_remove_block(&b12);
    let record = query.cns_by_name("cns", "alice").unwrap();
    assert_eq!(record.owner, b);
    assert_eq!(record.relay, "ipfs://x");

    // Undo the transfer: back to A.
    indexer.on_remove_block(&b11);
    assert_eq!(query.cns_by_name("cns", "alice").unwrap().owner, a);

    // Undo the registration: gone.
    indexer.on_remove_block(&b10);
    assert_eq!(query.cns_by_name("cns", "alice"), None);
    assert!(query.cns_available("cns", "alice"));
    assert_eq!(query.total_cns_count(), 0);
    assert_eq!(query.total_inscription_count(), 0);
    assert_eq!(indexer.last_indexed(), 9);
}

// ─── Scenario 2: first-seen wins within a block ──────────────────────────────

#[test]
fn first_seen_wins_across_tx_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (a, c) = (addr(1), addr(3));

    indexer.update(&block(
        5,
        vec![
            inscribe(a, a, r#"{"p":"cns","op":"reg","cns":"bob"}"#),
            inscribe(c, c, r#"{"p":"cns","op":"reg","cns":"bob"}"#),
        ],
    ));

    let query = indexer.query_handle();
    let record = query.cns_by_name("cns", "bob").unwrap();
    assert_eq!(record.owner, a);
    assert_eq!(record.registered_at, TxPosition::new(5, 0));
    assert_eq!(query.total_cns_count(), 1);
}

// ─── Scenario 3: token deploy + mints with caps ──────────────────────────────

#[test]
fn token_mint_caps() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (d, e, f, g, h) = (addr(4), addr(5), addr(6), addr(7), addr(8));

    indexer.update(&block(
        1,
        vec![inscribe(d, d, r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#)],
    ));
    indexer.update(&block(
        2,
        vec![
            inscribe(e, e, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"25"}"#),
            inscribe(f, f, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"40"}"#), // > lim
        ],
    ));
    indexer.update(&block(
        3,
        vec![inscribe(g, g, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"30"}"#)],
    ));
    indexer.update(&block(
        4,
        vec![inscribe(h, h, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"60"}"#)], // > lim and cap
    ));

    let query = indexer.query_handle();
    let token = query.token("FOO").unwrap();
    assert_eq!(token.total_minted, 55);
    assert_eq!(token.max_supply, 100);
    assert_eq!(token.deployer, d);
    assert_eq!(query.balance(&e, "FOO"), 25);
    assert_eq!(query.balance(&g, "FOO"), 30);
    assert_eq!(query.balance(&f, "FOO"), 0);
    assert_eq!(query.balance(&h, "FOO"), 0);

    // Balance consistency: Σ balances == total_minted.
    assert_eq!(
        query.balance(&e, "FOO") + query.balance(&g, "FOO"),
        token.total_minted
    );
    assert_eq!(query.total_token_count(), 1);
    assert_eq!(query.all_tokens().len(), 1);
}

#[test]
fn mint_rollback_restores_supply_and_balance() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (d, e) = (addr(4), addr(5));

    indexer.update(&block(
        1,
        vec![inscribe(d, d, r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#)],
    ));
    let mint_block = block(
        2,
        vec![inscribe(e, e, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"25"}"#)],
    );
    indexer.update(&mint_block);

    indexer.on_remove_block(&mint_block);

    let query = indexer.query_handle();
    assert_eq!(query.token("FOO").unwrap().total_minted, 0);
    assert_eq!(query.balance(&e, "FOO"), 0);
    assert_eq!(indexer.last_indexed(), 1);

    // Deploy rollback removes the token entirely.
    indexer.on_remove_block(&block(
        1,
        vec![inscribe(d, d, r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#)],
    ));
    assert_eq!(query.token("FOO"), None);
    assert_eq!(query.total_token_count(), 0);
}

// ─── Scenario 5: crash-replay safety ─────────────────────────────────────────

#[test]
fn crash_replay_does_not_double_mint() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut indexer = open_live(dir.path());
        indexer.update(&block(
            1,
            vec![inscribe(addr(4), addr(4), r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#)],
        ));
        indexer.update(&block(
            2,
            vec![inscribe(addr(5), addr(5), r#"{"p":"crc","op":"mint","tick":"FOO","amt":"10"}"#)],
        ));
    }

    // Simulate a crash after the mint was applied (metadata written) but
    // before the checkpoint advanced: rewind the checkpoint file by hand.
    {
        let mut checkpoint =
            CheckpointFile::open(dir.path().join("ordinal_last_indexed")).unwrap();
        checkpoint.set(1);
    }

    let mut indexer = OrdinalIndexer::open(IndexerConfig::new(dir.path())).unwrap();
    assert!(!indexer.rebuilding());
    indexer.on_start_read_from_db(2);
    // The store replays block 2; the existing metadata entry short-circuits
    // the mint.
    indexer.on_read_from_db(&block(
        2,
        vec![inscribe(addr(5), addr(5), r#"{"p":"crc","op":"mint","tick":"FOO","amt":"10"}"#)],
    ));
    indexer.on_db_read_finished();

    let query = indexer.query_handle();
    assert_eq!(query.token("FOO").unwrap().total_minted, 10);
    assert_eq!(query.balance(&addr(5), "FOO"), 10);
    assert_eq!(indexer.last_indexed(), 2);
}

// ─── Scenario 6: fallback user field ─────────────────────────────────────────

#[test]
fn fallback_field_999_indexes_like_primary() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());

    let tx = Transaction::new(addr(1), addr(1)).with_field(
        999,
        UserField::Text(r#"{"p":"cns","op":"reg","cns":"alice"}"#.into()),
    );
    indexer.update(&block(7, vec![tx]));

    let query = indexer.query_handle();
    let record = query.cns_by_name("cns", "alice").unwrap();
    assert_eq!(record.owner, addr(1));
    assert_eq!(record.registered_at, TxPosition::new(7, 0));
}

// ─── Determinism across restarts ─────────────────────────────────────────────

#[test]
fn replay_with_restarts_matches_straight_run() {
    let payloads: Vec<(u64, Vec<(u8, u8, &str)>)> = vec![
        (1, vec![(1, 1, r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#)]),
        (2, vec![(2, 2, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"25"}"#)]),
        (3, vec![(1, 1, r#"{"p":"cns","op":"reg","cns":"alice","relay":"r"}"#)]),
        (4, vec![(1, 3, r#"{"p":"cns","op":"trf","cns":"alice"}"#)]),
        (5, vec![(3, 3, r#"{"p":"cns","op":"upd","cns":"alice","relay":"s"}"#)]),
    ];
    let blocks: Vec<Block> = payloads
        .iter()
        .map(|(height, txs)| {
            block(
                *height,
                txs.iter()
                    .map(|(src, dst, payload)| inscribe(addr(*src), addr(*dst), payload))
                    .collect(),
            )
        })
        .collect();

    // Straight run.
    let straight_dir = tempfile::tempdir().unwrap();
    let mut straight = open_live(straight_dir.path());
    for b in &blocks {
        straight.update(b);
    }

    // Run with a restart between every block.
    let restart_dir = tempfile::tempdir().unwrap();
    open_live(restart_dir.path());
    for b in &blocks {
        let mut indexer = OrdinalIndexer::open(IndexerConfig::new(restart_dir.path())).unwrap();
        indexer.on_start_read_from_db(b.height.saturating_sub(1));
        indexer.on_db_read_finished();
        indexer.update(b);
        indexer.close();
    }

    let lhs = straight.query_handle();
    let rhs = OrdinalIndexer::open(IndexerConfig::new(restart_dir.path()))
        .unwrap()
        .query_handle();

    assert_eq!(lhs.cns_by_name("cns", "alice"), rhs.cns_by_name("cns", "alice"));
    assert_eq!(lhs.token("FOO"), rhs.token("FOO"));
    assert_eq!(lhs.balance(&addr(2), "FOO"), rhs.balance(&addr(2), "FOO"));
    assert_eq!(lhs.total_cns_count(), rhs.total_cns_count());
    assert_eq!(lhs.total_token_count(), rhs.total_token_count());
    assert_eq!(lhs.total_inscription_count(), rhs.total_inscription_count());

    // And the transferred-then-updated record looks right in both.
    let record = lhs.cns_by_name("cns", "alice").unwrap();
    assert_eq!(record.owner, addr(3));
    assert_eq!(record.relay, "s");
}

// ─── Owner scans & notifications ─────────────────────────────────────────────

#[test]
fn cns_by_owner_spans_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let (a, b) = (addr(1), addr(2));

    indexer.update(&block(
        1,
        vec![
            inscribe(a, a, r#"{"p":"cns","op":"reg","cns":"alice"}"#),
            inscribe(a, a, r#"{"p":"cdns","op":"reg","cns":"alice"}"#),
            inscribe(b, b, r#"{"p":"cns","op":"reg","cns":"bob"}"#),
        ],
    ));

    let query = indexer.query_handle();
    let owned = query.cns_by_owner(&a);
    assert_eq!(owned.len(), 2);
    assert!(owned.iter().all(|record| record.owner == a));
    assert_eq!(query.cns_by_owner(&b).len(), 1);
    assert_eq!(query.total_cns_count(), 3);
}

#[test]
fn notifications_fire_per_applied_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut indexer = open_live(dir.path());
    let events: Arc<Mutex<Vec<(String, u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    indexer.set_notification_callback(move |kind, _payload, height, tx_index| {
        sink.lock().unwrap().push((kind.to_string(), height, tx_index));
    });

    let (a, b) = (addr(1), addr(2));
    indexer.update(&block(
        1,
        vec![
            inscribe(a, a, r#"{"p":"cns","op":"reg","cns":"alice"}"#),
            inscribe(b, b, r#"{"p":"cns","op":"reg","cns":"alice"}"#), // rejected
            inscribe(a, a, r#"{"p":"crc","op":"deploy","tick":"FOO","max":"100","lim":"30"}"#),
        ],
    ));
    indexer.update(&block(
        2,
        vec![inscribe(b, b, r#"{"p":"crc","op":"mint","tick":"FOO","amt":"5"}"#)],
    ));

    let seen = events.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("cns_registration".to_string(), 1, 0),
            ("token_deploy".to_string(), 1, 2),
            ("token_mint".to_string(), 2, 0),
        ]
    );
}
