use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use tracing::*;

use crate::{
    chain::{ChainRpc, ChainSnapshot},
    error::Fatal,
};

/// Samples the primary chain and every secondary chain concurrently.
pub struct ChainStateAggregator {
    primary: Arc<dyn ChainRpc>,
    secondaries: Vec<Arc<dyn ChainRpc>>,
    expected_chain_ids: Vec<u64>,
}

impl ChainStateAggregator {
    pub fn new(
        primary: Arc<dyn ChainRpc>,
        secondaries: Vec<Arc<dyn ChainRpc>>,
        expected_chain_ids: Vec<u64>,
    ) -> Self {
        Self {
            primary,
            secondaries,
            expected_chain_ids,
        }
    }

    pub fn primary(&self) -> &Arc<dyn ChainRpc> {
        &self.primary
    }

    /// Snapshots of every monitored chain. Index 0 is always the primary chain, followed by the secondaries in
    /// configured order.
    pub async fn gather(&self) -> Result<Vec<ChainSnapshot>> {
        let chains: Vec<_> = std::iter::once(&self.primary)
            .chain(&self.secondaries)
            .cloned()
            .collect();
        let snapshots = gather(&chains).await?;
        self.assert_expected_network(snapshots[0].chain_id)?;
        Ok(snapshots)
    }

    /// Snapshots of the secondary chains only, in configured order.
    pub async fn gather_secondaries(&self) -> Result<Vec<ChainSnapshot>> {
        gather(&self.secondaries).await
    }

    /// Fails with [Fatal::WrongNetwork] unless the primary chain is one of the expected networks.
    pub async fn check_primary_network(&self) -> Result<u64> {
        let chain_id = self
            .primary
            .chain_id()
            .await
            .context("failed to read the primary chain id")?;
        self.assert_expected_network(chain_id)?;
        Ok(chain_id)
    }

    fn assert_expected_network(&self, chain_id: u64) -> Result<()> {
        if self.expected_chain_ids.contains(&chain_id) {
            Ok(())
        } else {
            Err(Fatal::WrongNetwork {
                chain_id,
                expected: self.expected_chain_ids.clone(),
            }
            .into())
        }
    }
}

/// Queries chain id, block height and node info of every chain at once, waiting until all of them have answered.
/// A single failed query fails the whole call. The result has the same order as `chains`.
pub async fn gather(chains: &[Arc<dyn ChainRpc>]) -> Result<Vec<ChainSnapshot>> {
    let snapshots = try_join_all(chains.iter().enumerate().map(|(index, chain)| async move {
        let (chain_id, block_height, node_info) =
            futures::try_join!(chain.chain_id(), chain.block_height(), chain.node_info())
                .with_context(|| format!("failed to sample the state of chain {index}"))?;
        Ok::<_, anyhow::Error>(ChainSnapshot {
            chain_id,
            block_height,
            node_info,
        })
    }))
    .await?;

    debug!(?snapshots, "gathered chain state");
    Ok(snapshots)
}
