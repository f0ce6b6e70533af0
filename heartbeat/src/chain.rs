//! The narrow interfaces through which rounds talk to chains and to the federation contract.

use alloy::{
    primitives::{Address, TxHash},
    rpc::types::Log,
};
use anyhow::Result;
use async_trait::async_trait;

/// Read-only access to one chain.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_height(&self) -> Result<u64>;

    /// A free-form description of the node serving this chain, as reported by `web3_clientVersion`.
    async fn node_info(&self) -> Result<String>;

    /// Heartbeat logs emitted by the federation contract in the inclusive range `[from, to]`. `None` means the
    /// node gave no answer at all, which is not the same as an empty page.
    async fn heartbeat_logs(&self, from: u64, to: u64) -> Result<Option<Vec<Log>>>;
}

/// Federation membership, as recorded on the primary chain.
#[async_trait]
pub trait Membership: Send + Sync {
    async fn is_member(&self, address: Address) -> Result<bool>;
}

/// Submits heartbeat transactions on the primary chain.
#[async_trait]
pub trait HeartbeatSubmitter: Send + Sync {
    fn signer_address(&self) -> Address;

    /// Publishes a heartbeat and waits for it to be mined. The three slices are aligned by index.
    async fn submit_heartbeat(
        &self,
        version: &str,
        chain_ids: &[u64],
        block_heights: &[u64],
        node_infos: &[String],
    ) -> Result<TxHash>;
}

/// The state of one chain, sampled in a single aggregation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub chain_id: u64,
    pub block_height: u64,
    pub node_info: String,
}
