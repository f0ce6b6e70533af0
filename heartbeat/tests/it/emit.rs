use std::{sync::Arc, time::Duration};

use heartbeat::{
    FEDERATOR_VERSION,
    chain::ChainRpc,
    checkpoint::MemoryCheckpointStore,
    error::{Fatal, HeartbeatError},
    test_util::{FakeChain, FakeFederation},
};
use tokio::time::Instant;

use crate::{PRIMARY_CHAIN_ID, federator, federator_with_secondaries};

#[tokio::test]
async fn heartbeat_reports_every_chain() {
    let federation = Arc::new(FakeFederation::member());
    let heartbeat = federator(
        Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 5_000_000)),
        federation.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        0,
    );

    heartbeat.emit_liveness().await.unwrap();

    let submitted = federation.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].version, FEDERATOR_VERSION);
    assert_eq!(submitted[0].chain_ids, vec![31, 1, 56]);
    assert_eq!(
        submitted[0].block_heights,
        vec![5_000_000, 20_000_000, 40_000_000]
    );
    assert_eq!(
        submitted[0].node_infos,
        vec!["fake/chain-31", "fake/chain-1", "fake/chain-56"]
    );
}

#[tokio::test(start_paused = true)]
async fn non_member_gives_up_after_three_attempts() {
    let federation = Arc::new(FakeFederation::non_member());
    let heartbeat = federator(
        Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 5_000_000)),
        federation.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        0,
    );
    let start = Instant::now();

    let err = heartbeat.emit_liveness().await.unwrap_err();

    match err {
        Fatal::RetriesExhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                last_error.downcast_ref::<HeartbeatError>(),
                Some(HeartbeatError::NotMember(_))
            ));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(federation.membership_checks(), 3);
    assert!(federation.submitted().is_empty());
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn unreachable_secondary_chain_prevents_emission() {
    let federation = Arc::new(FakeFederation::member());
    let heartbeat = federator_with_secondaries(
        Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 5_000_000)),
        vec![
            Arc::new(FakeChain::new(1, 20_000_000)) as Arc<dyn ChainRpc>,
            Arc::new(FakeChain::new(56, 40_000_000).failing_block_height()),
        ],
        federation.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        0,
    );

    let err = heartbeat.emit_liveness().await.unwrap_err();

    assert!(matches!(err, Fatal::RetriesExhausted { .. }));
    assert!(format!("{err}").contains("connection refused"));
    // Membership is only checked once every chain has been sampled.
    assert_eq!(federation.membership_checks(), 0);
    assert!(federation.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_chains_are_sampled_concurrently() {
    let federation = Arc::new(FakeFederation::member());
    let heartbeat = federator_with_secondaries(
        Arc::new(FakeChain::new(PRIMARY_CHAIN_ID, 5_000_000).with_delay(Duration::from_secs(2))),
        vec![
            Arc::new(FakeChain::new(1, 20_000_000).with_delay(Duration::from_secs(5)))
                as Arc<dyn ChainRpc>,
            Arc::new(FakeChain::new(56, 40_000_000).with_delay(Duration::from_secs(1))),
        ],
        federation.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        0,
    );
    let start = Instant::now();

    heartbeat.emit_liveness().await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(federation.submitted()[0].chain_ids, vec![31, 1, 56]);
}

#[tokio::test]
async fn wrong_primary_network_is_not_retried() {
    let federation = Arc::new(FakeFederation::member());
    let heartbeat = federator(
        Arc::new(FakeChain::new(1, 5_000_000)),
        federation.clone(),
        Arc::new(MemoryCheckpointStore::new()),
        0,
    );

    let err = heartbeat.emit_liveness().await.unwrap_err();

    assert!(matches!(err, Fatal::WrongNetwork { chain_id: 1, .. }));
    assert_eq!(federation.membership_checks(), 0);
}
