use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, Log},
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::*;
use url::Url;

use crate::{
    cfg::{ChainConfig, PrimaryChainConfig},
    chain::{ChainRpc, HeartbeatSubmitter, Membership},
    contracts::Federation,
};

/// Read-only JSON-RPC access to one chain over HTTP.
#[derive(Clone)]
pub struct ChainClient {
    pub rpc_url: String,
    provider: DynProvider,
    /// Only set for the primary chain, which is the only one we read logs from.
    federation_address: Option<Address>,
}

impl ChainClient {
    pub fn new(config: &ChainConfig) -> Result<Self> {
        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            provider: http_provider(&config.rpc_url)?,
            federation_address: None,
        })
    }

    pub fn primary(config: &PrimaryChainConfig) -> Result<Self> {
        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            provider: http_provider(&config.rpc_url)?,
            federation_address: Some(config.federation_address),
        })
    }
}

fn http_provider(rpc_url: &str) -> Result<DynProvider> {
    let url = Url::parse(rpc_url).with_context(|| format!("invalid rpc url {rpc_url}"))?;
    Ok(ProviderBuilder::new().on_http(url).erased())
}

#[async_trait]
impl ChainRpc for ChainClient {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn block_height(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn node_info(&self) -> Result<String> {
        Ok(self.provider.get_client_version().await?)
    }

    async fn heartbeat_logs(&self, from: u64, to: u64) -> Result<Option<Vec<Log>>> {
        let federation_address = self
            .federation_address
            .ok_or_else(|| anyhow!("{} is not the primary chain", self.rpc_url))?;
        let logs = self
            .provider
            .get_logs(&heartbeat_filter(federation_address, from, to))
            .await?;
        Ok(Some(logs))
    }
}

/// `HeartBeat` events emitted by the federation contract in `[from, to]`.
fn heartbeat_filter(federation_address: Address, from: u64, to: u64) -> Filter {
    Filter::new()
        .address(federation_address)
        .event_signature(Federation::HeartBeat::SIGNATURE_HASH)
        .from_block(from)
        .to_block(to)
}

/// The federation contract on the primary chain, with a wallet to sign heartbeats.
#[derive(Clone)]
pub struct FederationClient {
    provider: DynProvider,
    federation_address: Address,
    signer_address: Address,
    receipt_timeout: Duration,
}

impl FederationClient {
    pub fn new(config: &PrimaryChainConfig, signer: PrivateKeySigner) -> Result<Self> {
        let url = Url::parse(&config.rpc_url)
            .with_context(|| format!("invalid rpc url {}", config.rpc_url))?;
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url)
            .erased();

        Ok(Self {
            provider,
            federation_address: config.federation_address,
            signer_address,
            receipt_timeout: config.receipt_timeout,
        })
    }
}

#[async_trait]
impl Membership for FederationClient {
    async fn is_member(&self, address: Address) -> Result<bool> {
        let federation = Federation::new(self.federation_address, self.provider.clone());
        let result = federation.isMember(address).call().await?;
        Ok(result._0)
    }
}

#[async_trait]
impl HeartbeatSubmitter for FederationClient {
    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn submit_heartbeat(
        &self,
        version: &str,
        chain_ids: &[u64],
        block_heights: &[u64],
        node_infos: &[String],
    ) -> Result<TxHash> {
        let federation = Federation::new(self.federation_address, self.provider.clone());
        let pending = federation
            .emitHeartbeat(
                version.to_owned(),
                chain_ids.iter().copied().map(U256::from).collect(),
                block_heights.iter().copied().map(U256::from).collect(),
                node_infos.to_vec(),
            )
            .send()
            .await
            .context("failed to broadcast heartbeat transaction")?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "heartbeat transaction sent");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .with_context(|| {
                format!(
                    "heartbeat transaction {tx_hash} was not mined within {:?}",
                    self.receipt_timeout
                )
            })?;
        check_mined(receipt.transaction_hash, receipt.status())
    }
}

fn check_mined(tx_hash: TxHash, success: bool) -> Result<TxHash> {
    if success {
        Ok(tx_hash)
    } else {
        Err(anyhow!("heartbeat transaction {tx_hash} reverted"))
    }
}
