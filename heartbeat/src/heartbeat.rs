//! The two top-level rounds: publishing our heartbeat and reading everybody else's.

use std::{future::Future, sync::Arc, time::Duration};

use alloy::{primitives::TxHash, rpc::types::Log, signers::local::PrivateKeySigner};
use anyhow::{Context, Result};
use tokio::time::{MissedTickBehavior, interval};
use tracing::*;

use crate::{
    FEDERATOR_VERSION,
    aggregator::ChainStateAggregator,
    cfg::Config,
    chain::ChainRpc,
    checkpoint::{CheckpointStore, FileCheckpointStore},
    client::{ChainClient, FederationClient},
    emitter::LivenessEmitter,
    error::Fatal,
    ingest::EventIngestor,
    metrics::HeartbeatMetrics,
    paginator::{LogPaginator, ScanOutcome},
    retry::RetryExecutor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The primary chain has no blocks yet.
    EmptyChain,
    /// Every block up to the chain head has already been processed.
    NotAdvanced { last_processed: u64, chain_height: u64 },
    Synced {
        from: u64,
        to: u64,
        pages: u64,
        events: usize,
    },
}

impl SyncOutcome {
    pub fn is_no_op(&self) -> bool {
        !matches!(self, SyncOutcome::Synced { .. })
    }
}

/// How often each round runs. `None` disables the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub emit: Option<Duration>,
    pub sync: Option<Duration>,
}

pub struct Heartbeat {
    aggregator: ChainStateAggregator,
    emitter: LivenessEmitter,
    checkpoint: Arc<dyn CheckpointStore>,
    paginator: LogPaginator,
    ingestor: EventIngestor,
    retry: RetryExecutor,
    /// Floor for the checkpoint. Blocks at or below it are never scanned.
    from_block: u64,
    version: String,
}

impl Heartbeat {
    pub fn new(
        aggregator: ChainStateAggregator,
        emitter: LivenessEmitter,
        checkpoint: Arc<dyn CheckpointStore>,
        from_block: u64,
    ) -> Self {
        Self {
            aggregator,
            emitter,
            checkpoint,
            paginator: LogPaginator::default(),
            ingestor: EventIngestor,
            retry: RetryExecutor::default(),
            from_block,
            version: FEDERATOR_VERSION.to_owned(),
        }
    }

    /// Connects to every configured chain over JSON-RPC and keeps the checkpoint in `config.storage_path`.
    pub fn from_config(
        config: &Config,
        signer: PrivateKeySigner,
        metrics: Arc<dyn HeartbeatMetrics>,
    ) -> Result<Self> {
        let primary: Arc<dyn ChainRpc> = Arc::new(ChainClient::primary(&config.primary)?);
        let secondaries = config
            .secondaries
            .iter()
            .map(|chain| Ok(Arc::new(ChainClient::new(chain)?) as Arc<dyn ChainRpc>))
            .collect::<Result<Vec<_>>>()?;
        let aggregator =
            ChainStateAggregator::new(primary, secondaries, config.expected_chain_ids.clone());

        let federation = Arc::new(FederationClient::new(&config.primary, signer)?);
        let emitter = LivenessEmitter::new(federation.clone(), federation).with_metrics(metrics);

        let checkpoint = Arc::new(FileCheckpointStore::new(config.checkpoint_path())?);

        Ok(Self::new(aggregator, emitter, checkpoint, config.primary.from_block)
            .with_page_size(config.page_size)
            .with_retry(RetryExecutor::new(config.retry)))
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.paginator = LogPaginator::new(page_size);
        self
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Runs both rounds on their own cadences, starting each one immediately. The cadences are polled concurrently, so
    /// a slow round never delays the other one. Only returns when a round fails fatally.
    pub async fn run(&self, schedule: Schedule) -> Fatal {
        let emit = every(schedule.emit, || async {
            self.emit_liveness().await.map(|_| ())
        });
        let sync = every(schedule.sync, || async { self.sync_logs().await.map(|_| ()) });
        tokio::select! {
            fatal = emit => fatal,
            fatal = sync => fatal,
        }
    }

    /// Samples every chain and publishes a heartbeat describing them.
    pub async fn emit_liveness(&self) -> Result<TxHash, Fatal> {
        self.retry
            .run("emit heartbeat", || self.emit_round())
            .await
    }

    async fn emit_round(&self) -> Result<TxHash> {
        let chains = self
            .aggregator
            .gather()
            .await
            .context("failed to gather chain state")?;
        self.emitter.emit(&self.version, &chains).await
    }

    /// Reads heartbeat logs published since the last checkpoint, up to the current primary chain head.
    pub async fn sync_logs(&self) -> Result<SyncOutcome, Fatal> {
        self.retry.run("read heartbeat logs", || self.sync_round()).await
    }

    async fn sync_round(&self) -> Result<SyncOutcome> {
        self.aggregator.check_primary_network().await?;

        let primary = self.aggregator.primary();
        let to_block = primary
            .block_height()
            .await
            .context("failed to read the primary chain height")?;
        info!("Running to block {to_block}");
        if to_block == 0 {
            return Ok(SyncOutcome::EmptyChain);
        }

        let last_processed = self.checkpoint.load(self.from_block);
        if last_processed >= to_block {
            warn!(
                "Current chain height {to_block} is the same or lesser than the last block processed {last_processed}"
            );
            return Ok(SyncOutcome::NotAdvanced {
                last_processed,
                chain_height: to_block,
            });
        }
        let from_block = last_processed + 1;
        debug!("Running from block {from_block}");

        let aggregator = &self.aggregator;
        let ingestor = self.ingestor;
        let outcome = self
            .paginator
            .scan(
                from_block,
                to_block,
                self.checkpoint.as_ref(),
                move |from, to| primary.heartbeat_logs(from, to),
                move |_, logs: Vec<Log>| async move {
                    let side_chains = aggregator.gather_secondaries().await?;
                    ingestor.process(&logs, &side_chains)?;
                    Ok::<_, anyhow::Error>(())
                },
            )
            .await?;

        Ok(match outcome {
            ScanOutcome::NoOp => SyncOutcome::NotAdvanced {
                last_processed,
                chain_height: to_block,
            },
            ScanOutcome::Scanned { pages, events, .. } => SyncOutcome::Synced {
                from: from_block,
                to: to_block,
                pages,
                events,
            },
        })
    }
}

async fn every<F, Fut>(period: Option<Duration>, mut round: F) -> Fatal
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), Fatal>>,
{
    let Some(period) = period else {
        return std::future::pending().await;
    };
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(fatal) = round().await {
            return fatal;
        }
    }
}
