//! Decoding of heartbeat logs published by other federation members.

use alloy::{
    primitives::{Address, U256},
    rpc::types::Log,
};
use anyhow::{Context, Result};
use tracing::*;

use crate::{chain::ChainSnapshot, contracts::Federation, error::HeartbeatError};

/// The state of one chain as reported by a federation member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerChainState {
    pub chain_id: u64,
    pub block_height: u64,
    pub node_info: String,
}

/// A decoded heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessRecord {
    pub sender: Address,
    pub chain_id: u64,
    pub block_height: u64,
    pub version: String,
    pub peers: Vec<PeerChainState>,
    /// The primary chain block the log was included in, if the node reported it.
    pub log_block: Option<u64>,
}

/// How far a member's view of a chain is behind ours. Negative if the member is ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGap {
    pub chain_id: u64,
    pub gap: i128,
}

impl LivenessRecord {
    pub fn decode(index: usize, log: &Log) -> Result<Self, HeartbeatError> {
        let malformed = |reason: String| HeartbeatError::MalformedEvent { index, reason };

        let decoded = log
            .log_decode::<Federation::HeartBeat>()
            .map_err(|e| malformed(e.to_string()))?;
        let event = decoded.inner.data;

        let (ids, heights, infos) = (
            event.fedChainsIds.len(),
            event.fedChainsBlocks.len(),
            event.fedChainsInfo.len(),
        );
        if ids != heights || ids != infos {
            return Err(HeartbeatError::MisalignedPeers {
                ids,
                heights,
                infos,
            });
        }

        let peers = event
            .fedChainsIds
            .iter()
            .zip(&event.fedChainsBlocks)
            .zip(event.fedChainsInfo)
            .map(|((chain_id, block_height), node_info)| {
                Ok(PeerChainState {
                    chain_id: to_u64(*chain_id, "fedChainsIds").map_err(malformed)?,
                    block_height: to_u64(*block_height, "fedChainsBlocks").map_err(malformed)?,
                    node_info,
                })
            })
            .collect::<Result<Vec<_>, HeartbeatError>>()?;

        Ok(Self {
            sender: event.sender,
            chain_id: to_u64(event.currentChainId, "currentChainId").map_err(malformed)?,
            block_height: to_u64(event.currentBlock, "currentBlock").map_err(malformed)?,
            version: event.fedVersion,
            peers,
            log_block: log.block_number,
        })
    }

    /// Compares each reported chain with our own snapshot of the same chain.
    pub fn block_gaps(&self, ours: &[ChainSnapshot]) -> Vec<BlockGap> {
        self.peers
            .iter()
            .filter_map(|peer| {
                let snapshot = ours.iter().find(|s| s.chain_id == peer.chain_id)?;
                Some(BlockGap {
                    chain_id: peer.chain_id,
                    gap: i128::from(snapshot.block_height) - i128::from(peer.block_height),
                })
            })
            .collect()
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("{field} value {value} does not fit in 64 bits"))
}

/// Turns raw heartbeat logs into [LivenessRecord]s and reports each one.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventIngestor;

impl EventIngestor {
    /// Decodes every log before reporting any of them, so one malformed log fails the whole page.
    pub fn process(&self, logs: &[Log], side_chains: &[ChainSnapshot]) -> Result<Vec<LivenessRecord>> {
        let records = logs
            .iter()
            .enumerate()
            .map(|(index, log)| LivenessRecord::decode(index, log))
            .collect::<Result<Vec<_>, _>>()
            .context("exception processing heartbeat logs")?;

        for record in &records {
            let peer_chain_ids: Vec<_> = record.peers.iter().map(|p| p.chain_id).collect();
            let peer_block_heights: Vec<_> = record.peers.iter().map(|p| p.block_height).collect();
            let peer_node_infos: Vec<_> = record.peers.iter().map(|p| p.node_info.as_str()).collect();
            info!(
                event = "HeartBeat",
                sender = %record.sender,
                version = %record.version,
                chain_id = record.chain_id,
                block_height = record.block_height,
                ?peer_chain_ids,
                ?peer_block_heights,
                ?peer_node_infos,
                "heartbeat"
            );
            let gaps = record.block_gaps(side_chains);
            if !gaps.is_empty() {
                debug!(sender = %record.sender, ?gaps, "block gaps against our side chains");
            }
        }

        Ok(records)
    }
}
