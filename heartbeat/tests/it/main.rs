mod emit;
mod sync;

use std::sync::Arc;

use heartbeat::{
    aggregator::ChainStateAggregator,
    chain::ChainRpc,
    checkpoint::CheckpointStore,
    emitter::LivenessEmitter,
    heartbeat::Heartbeat,
    test_util::{FakeChain, FakeFederation},
};

/// RSK testnet.
const PRIMARY_CHAIN_ID: u64 = 31;

/// A heartbeat over `primary` and two well-behaved secondary chains, with default paging and retries.
fn federator(
    primary: Arc<FakeChain>,
    federation: Arc<FakeFederation>,
    checkpoint: Arc<dyn CheckpointStore>,
    from_block: u64,
) -> Heartbeat {
    federator_with_secondaries(
        primary,
        vec![
            Arc::new(FakeChain::new(1, 20_000_000)) as Arc<dyn ChainRpc>,
            Arc::new(FakeChain::new(56, 40_000_000)),
        ],
        federation,
        checkpoint,
        from_block,
    )
}

fn federator_with_secondaries(
    primary: Arc<FakeChain>,
    secondaries: Vec<Arc<dyn ChainRpc>>,
    federation: Arc<FakeFederation>,
    checkpoint: Arc<dyn CheckpointStore>,
    from_block: u64,
) -> Heartbeat {
    Heartbeat::new(
        ChainStateAggregator::new(primary, secondaries, vec![30, 31, 33]),
        LivenessEmitter::new(federation.clone(), federation),
        checkpoint,
        from_block,
    )
}
