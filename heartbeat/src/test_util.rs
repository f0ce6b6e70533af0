//! In-memory chains and federation contracts, for driving whole rounds in tests.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, TxHash, U256, address},
    rpc::types::Log,
    sol_types::SolEvent,
};
use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::{
    chain::{ChainRpc, HeartbeatSubmitter, Membership},
    contracts::Federation,
    metrics::{EmissionRecord, HeartbeatMetrics},
};

pub const FEDERATION_ADDRESS: Address = address!("0x5d663981d930e8ec108280b9d80885658148ab0f");
pub const SIGNER_ADDRESS: Address = address!("0x000000000000000000000000000000000000f00d");

pub struct FakeChain {
    chain_id: u64,
    block_height: AtomicU64,
    node_info: String,
    delay: Duration,
    fail_block_height: bool,
    height_queries: AtomicUsize,
    logs: Mutex<Vec<Log>>,
    /// Queries starting at one of these blocks get no answer.
    unanswered: Mutex<Vec<u64>>,
    log_queries: Mutex<Vec<(u64, u64)>>,
}

impl FakeChain {
    pub fn new(chain_id: u64, block_height: u64) -> Self {
        Self {
            chain_id,
            block_height: AtomicU64::new(block_height),
            node_info: format!("fake/chain-{chain_id}"),
            delay: Duration::ZERO,
            fail_block_height: false,
            height_queries: AtomicUsize::new(0),
            logs: Mutex::new(vec![]),
            unanswered: Mutex::new(vec![]),
            log_queries: Mutex::new(vec![]),
        }
    }

    /// Every query sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_block_height(mut self) -> Self {
        self.fail_block_height = true;
        self
    }

    pub fn with_logs(self, logs: Vec<Log>) -> Self {
        *self.logs.lock().unwrap() = logs;
        self
    }

    pub fn set_block_height(&self, block_height: u64) {
        self.block_height.store(block_height, Ordering::SeqCst);
    }

    pub fn leave_unanswered(&self, from: u64) {
        self.unanswered.lock().unwrap().push(from);
    }

    pub fn answer_everything(&self) {
        self.unanswered.lock().unwrap().clear();
    }

    /// How many times the block height has been asked for.
    pub fn height_queries(&self) -> usize {
        self.height_queries.load(Ordering::SeqCst)
    }

    /// Every `(from, to)` range requested so far, in order.
    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().unwrap().clone()
    }

    async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        self.wait().await;
        Ok(self.chain_id)
    }

    async fn block_height(&self) -> Result<u64> {
        self.wait().await;
        self.height_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_block_height {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn node_info(&self) -> Result<String> {
        self.wait().await;
        Ok(self.node_info.clone())
    }

    async fn heartbeat_logs(&self, from: u64, to: u64) -> Result<Option<Vec<Log>>> {
        self.wait().await;
        self.log_queries.lock().unwrap().push((from, to));
        if self.unanswered.lock().unwrap().contains(&from) {
            return Ok(None);
        }
        let logs = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.block_number.is_some_and(|b| (from..=to).contains(&b)))
            .cloned()
            .collect();
        Ok(Some(logs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedHeartbeat {
    pub version: String,
    pub chain_ids: Vec<u64>,
    pub block_heights: Vec<u64>,
    pub node_infos: Vec<String>,
}

pub struct FakeFederation {
    member: bool,
    fail_submissions: bool,
    submission_delay: Duration,
    membership_checks: AtomicUsize,
    submitted: Mutex<Vec<SubmittedHeartbeat>>,
}

impl FakeFederation {
    pub fn member() -> Self {
        Self {
            member: true,
            fail_submissions: false,
            submission_delay: Duration::ZERO,
            membership_checks: AtomicUsize::new(0),
            submitted: Mutex::new(vec![]),
        }
    }

    pub fn non_member() -> Self {
        Self {
            member: false,
            ..Self::member()
        }
    }

    pub fn failing_submissions(mut self) -> Self {
        self.fail_submissions = true;
        self
    }

    /// Submissions take `delay` before they are accepted, like a transaction waiting to be mined.
    pub fn with_submission_delay(mut self, delay: Duration) -> Self {
        self.submission_delay = delay;
        self
    }

    pub fn submitted(&self) -> Vec<SubmittedHeartbeat> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn membership_checks(&self) -> usize {
        self.membership_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Membership for FakeFederation {
    async fn is_member(&self, address: Address) -> Result<bool> {
        self.membership_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.member && address == SIGNER_ADDRESS)
    }
}

#[async_trait]
impl HeartbeatSubmitter for FakeFederation {
    fn signer_address(&self) -> Address {
        SIGNER_ADDRESS
    }

    async fn submit_heartbeat(
        &self,
        version: &str,
        chain_ids: &[u64],
        block_heights: &[u64],
        node_infos: &[String],
    ) -> Result<TxHash> {
        if !self.submission_delay.is_zero() {
            tokio::time::sleep(self.submission_delay).await;
        }
        if self.fail_submissions {
            return Err(anyhow!("failed to broadcast transaction"));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(SubmittedHeartbeat {
            version: version.to_owned(),
            chain_ids: chain_ids.to_vec(),
            block_heights: block_heights.to_vec(),
            node_infos: node_infos.to_vec(),
        });
        Ok(TxHash::with_last_byte(submitted.len() as u8))
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    records: Mutex<Vec<EmissionRecord>>,
}

impl RecordingMetrics {
    pub fn records(&self) -> Vec<EmissionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl HeartbeatMetrics for RecordingMetrics {
    fn track_emission(&self, record: &EmissionRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Wraps an event in an RPC log emitted by the federation contract at `block`.
pub fn log_from_event<E: SolEvent>(event: &E, block: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: FEDERATION_ADDRESS,
            data: event.encode_log_data(),
        },
        block_number: Some(block),
        ..Default::default()
    }
}

/// A heartbeat from `sender` included at `block`. The first chain in `chains` is the sender's primary chain.
pub fn heartbeat_log(sender: Address, block: u64, chains: &[(u64, u64, &str)]) -> Log {
    let (current_chain_id, current_block, _) = chains[0];
    let event = Federation::HeartBeat {
        sender,
        currentChainId: U256::from(current_chain_id),
        currentBlock: U256::from(current_block),
        fedVersion: "3.0.0".to_owned(),
        fedChainsIds: chains.iter().map(|c| U256::from(c.0)).collect(),
        fedChainsBlocks: chains.iter().map(|c| U256::from(c.1)).collect(),
        fedChainsInfo: chains.iter().map(|c| c.2.to_owned()).collect(),
    };
    log_from_event(&event, block)
}
