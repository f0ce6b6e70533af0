use std::{fs, sync::Arc};

use alloy::primitives::{U256, address};
use heartbeat::{
    checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore},
    contracts::Federation,
    error::{Fatal, HeartbeatError},
    heartbeat::SyncOutcome,
    test_util::{FakeChain, FakeFederation, heartbeat_log, log_from_event},
};
use tempfile::tempdir;

use crate::{PRIMARY_CHAIN_ID, federator};

#[tokio::test(start_paused = true)]
async fn restart_resumes_after_missing_page() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db").join("heartBeatLastBlock.txt");
    let sender = address!("0x00000000000000000000000000000000000000aa");
    let primary = Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 2500).with_logs(vec![
        heartbeat_log(sender, 150, &[(31, 140, "rskj"), (1, 19_000_000, "geth")]),
        heartbeat_log(sender, 1500, &[(31, 1490, "rskj"), (1, 19_000_100, "geth")]),
        heartbeat_log(sender, 2200, &[(31, 2190, "rskj"), (1, 19_000_200, "geth")]),
    ]));
    primary.leave_unanswered(1100);

    let first = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        Arc::new(FileCheckpointStore::new(&path).unwrap()),
        99,
    );
    match first.sync_logs().await.unwrap_err() {
        Fatal::RetriesExhausted { last_error, .. } => assert!(matches!(
            last_error.downcast_ref::<HeartbeatError>(),
            Some(HeartbeatError::MissingLogs {
                from: 1100,
                to: 2099
            })
        )),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(fs::read_to_string(&path).unwrap(), "1099");
    // Every retry starts from the checkpoint, so the first page is not fetched twice.
    assert_eq!(
        primary.log_queries(),
        vec![(100, 1099), (1100, 2099), (1100, 2099), (1100, 2099)]
    );

    primary.answer_everything();
    let restarted = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        Arc::new(FileCheckpointStore::new(&path).unwrap()),
        99,
    );
    let outcome = restarted.sync_logs().await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            from: 1100,
            to: 2500,
            pages: 2,
            events: 2
        }
    );
    assert_eq!(primary.log_queries()[4..], [(1100, 2099), (2100, 2500)]);
    assert_eq!(fs::read_to_string(&path).unwrap(), "2500");
}

#[tokio::test]
async fn later_rounds_only_scan_new_blocks() {
    let primary = Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 2500));
    let checkpoint = Arc::new(MemoryCheckpointStore::new());
    let heartbeat = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        checkpoint.clone(),
        0,
    );

    assert_eq!(
        heartbeat.sync_logs().await.unwrap(),
        SyncOutcome::Synced {
            from: 1,
            to: 2500,
            pages: 3,
            events: 0
        }
    );
    assert_eq!(
        heartbeat.sync_logs().await.unwrap(),
        SyncOutcome::NotAdvanced {
            last_processed: 2500,
            chain_height: 2500
        }
    );

    primary.set_block_height(3200);
    assert_eq!(
        heartbeat.sync_logs().await.unwrap(),
        SyncOutcome::Synced {
            from: 2501,
            to: 3200,
            pages: 1,
            events: 0
        }
    );
    assert_eq!(
        primary.log_queries(),
        vec![(1, 1000), (1001, 2000), (2001, 2500), (2501, 3200)]
    );
    assert_eq!(checkpoint.commits(), vec![1000, 2000, 2500, 3200]);
}

#[tokio::test]
async fn checkpoint_below_the_floor_is_ignored() {
    let primary = Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 5000));
    let checkpoint = Arc::new(MemoryCheckpointStore::with_value(9));
    let heartbeat = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        checkpoint.clone(),
        4000,
    );

    let outcome = heartbeat.sync_logs().await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Synced {
            from: 4001,
            to: 5000,
            pages: 1,
            events: 0
        }
    );
    assert_eq!(checkpoint.load(0), 5000);
}

#[tokio::test(start_paused = true)]
async fn malformed_heartbeat_holds_back_the_checkpoint() {
    let sender = address!("0x00000000000000000000000000000000000000bb");
    let misaligned = Federation::HeartBeat {
        sender,
        currentChainId: U256::from(31),
        currentBlock: U256::from(1400),
        fedVersion: "3.0.0".to_owned(),
        fedChainsIds: vec![U256::from(31), U256::from(1)],
        fedChainsBlocks: vec![U256::from(1400)],
        fedChainsInfo: vec!["rskj".to_owned(), "geth".to_owned()],
    };
    let primary = Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 2500).with_logs(vec![
        heartbeat_log(sender, 150, &[(31, 140, "rskj")]),
        log_from_event(&misaligned, 1500),
    ]));
    let checkpoint = Arc::new(MemoryCheckpointStore::new());
    let heartbeat = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        checkpoint.clone(),
        99,
    );

    match heartbeat.sync_logs().await.unwrap_err() {
        Fatal::RetriesExhausted { last_error, .. } => assert!(matches!(
            last_error.downcast_ref::<HeartbeatError>(),
            Some(HeartbeatError::MisalignedPeers {
                ids: 2,
                heights: 1,
                infos: 2
            })
        )),
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(checkpoint.commits(), vec![1099]);
}

#[tokio::test]
async fn wrong_primary_network_stops_sync_before_reading_logs() {
    let primary = Arc::new(FakeChain::new(56, 2500));
    let checkpoint = Arc::new(MemoryCheckpointStore::new());
    let heartbeat = federator(
        primary.clone(),
        Arc::new(FakeFederation::member()),
        checkpoint.clone(),
        0,
    );

    let err = heartbeat.sync_logs().await.unwrap_err();

    assert!(matches!(err, Fatal::WrongNetwork { chain_id: 56, .. }));
    assert!(primary.log_queries().is_empty());
    assert!(checkpoint.commits().is_empty());
}
