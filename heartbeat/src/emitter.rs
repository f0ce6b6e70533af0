use std::sync::Arc;

use alloy::primitives::TxHash;
use anyhow::{Context, Result};
use tracing::*;

use crate::{
    chain::{ChainSnapshot, HeartbeatSubmitter, Membership},
    error::HeartbeatError,
    metrics::{EmissionRecord, HeartbeatMetrics, NoopMetrics},
};

/// Publishes this federator's heartbeat on the primary chain.
pub struct LivenessEmitter {
    submitter: Arc<dyn HeartbeatSubmitter>,
    membership: Arc<dyn Membership>,
    metrics: Arc<dyn HeartbeatMetrics>,
}

impl LivenessEmitter {
    pub fn new(submitter: Arc<dyn HeartbeatSubmitter>, membership: Arc<dyn Membership>) -> Self {
        Self {
            submitter,
            membership,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn HeartbeatMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// `chains` must start with the primary chain. Fails if our signer is not a federation member.
    pub async fn emit(&self, version: &str, chains: &[ChainSnapshot]) -> Result<TxHash> {
        let chain_ids: Vec<_> = chains.iter().map(|c| c.chain_id).collect();
        let block_heights: Vec<_> = chains.iter().map(|c| c.block_height).collect();
        let node_infos: Vec<_> = chains.iter().map(|c| c.node_info.clone()).collect();

        self.emit_inner(version, chains, &chain_ids, &block_heights, &node_infos)
            .await
            .with_context(|| {
                format!(
                    "exception emitting heartbeat fedVersion: {version} fedChainIds: {chain_ids:?} fedChainsBlocks: {block_heights:?} fedChainsInfo: {node_infos:?}"
                )
            })
    }

    async fn emit_inner(
        &self,
        version: &str,
        chains: &[ChainSnapshot],
        chain_ids: &[u64],
        block_heights: &[u64],
        node_infos: &[String],
    ) -> Result<TxHash> {
        let from = self.submitter.signer_address();
        if !self.membership.is_member(from).await? {
            return Err(HeartbeatError::NotMember(from).into());
        }

        info!("emitHeartbeat({version}, {chain_ids:?}, {block_heights:?}, {node_infos:?})");
        let tx_hash = self
            .submitter
            .submit_heartbeat(version, chain_ids, block_heights, node_infos)
            .await?;

        for chain in chains {
            self.metrics.track_emission(&EmissionRecord {
                sender: from,
                version: version.to_owned(),
                block_height: chain.block_height,
                node_info: chain.node_info.clone(),
                chain_id: chain.chain_id,
            });
        }
        info!(%tx_hash, "success emitting heartbeat");
        Ok(tx_hash)
    }
}
