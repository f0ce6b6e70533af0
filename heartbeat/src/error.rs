use alloy::primitives::Address;

/// Conditions under which the daemon must stop rather than carry on.
///
/// A [Fatal] may be carried inside an [anyhow::Error]; [crate::retry::RetryExecutor] downcasts to find it and gives up
/// immediately instead of retrying.
#[derive(thiserror::Error, Debug)]
pub enum Fatal {
    #[error("heartbeat must only run on networks {expected:?}, but the primary chain id is {chain_id}")]
    WrongNetwork { chain_id: u64, expected: Vec<u64> },
    #[error("{operation} failed after {attempts} attempts: {last_error:#}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: anyhow::Error,
    },
}

/// Failures which abort the current attempt of a round. They are retried.
#[derive(thiserror::Error, Debug)]
pub enum HeartbeatError {
    #[error("this federator address {0} is not part of the federation")]
    NotMember(Address),
    #[error("failed to obtain heartbeat logs for blocks {from} to {to}")]
    MissingLogs { from: u64, to: u64 },
    #[error("heartbeat log {index} is malformed: {reason}")]
    MalformedEvent { index: usize, reason: String },
    #[error("peer arrays are misaligned: {ids} chain ids, {heights} block heights, {infos} node infos")]
    MisalignedPeers {
        ids: usize,
        heights: usize,
        infos: usize,
    },
}
