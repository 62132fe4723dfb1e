//! Chain access for the rewarder
//!
//! `ChainSource` is the narrow seam between the scan loop and the RPC
//! endpoint: current head, log queries, the sender's nonce, transaction
//! submission and receipt waiting. The production implementation wraps alloy
//! HTTP providers; tests drive the loop with a mock.
//!
//! # Transaction Building
//!
//! Submission uses `ProviderBuilder::with_recommended_fillers()` so gas
//! fields are populated automatically. The nonce is set explicitly by the
//! caller, which fetches it immediately before each submission.

use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use tracing::{debug, info};

use crate::error::{QueryError, SubmitError};

/// The slice of a transaction receipt the scan loop cares about.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub status: bool,
    pub block_number: Option<u64>,
}

/// The chain operations the rewarder core depends on.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Address transactions are sent from, if signing material is loaded.
    fn sender(&self) -> Option<Address>;

    /// Current chain head height.
    async fn head_number(&self) -> Result<u64, QueryError>;

    /// All logs matching the filter, in chain order.
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, QueryError>;

    /// Current transaction count of an account.
    async fn nonce(&self, account: Address) -> Result<u64, QueryError>;

    /// Sign and submit a transaction, returning its hash without waiting
    /// for inclusion.
    async fn submit(&self, tx: TransactionRequest) -> Result<B256, SubmitError>;

    /// Block until the transaction reaches a mined state or the receipt
    /// timeout elapses.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, SubmitError>;
}

/// Production `ChainSource` backed by an EVM JSON-RPC endpoint.
pub struct EvmChainClient {
    rpc_url: String,
    signer: Option<PrivateKeySigner>,
    receipt_timeout: Duration,
}

impl EvmChainClient {
    /// Create a new client. Without a private key the client is read-only
    /// and any submission fails with [`SubmitError::NoSigner`].
    pub fn new(
        rpc_url: &str,
        private_key: Option<&str>,
        receipt_timeout: Duration,
    ) -> Result<Self> {
        let signer = match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key.parse().wrap_err("Invalid private key")?;
                info!(sender = %signer.address(), "EVM chain client initialized");
                Some(signer)
            }
            None => {
                info!("EVM chain client initialized without signer");
                None
            }
        };

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            signer,
            receipt_timeout,
        })
    }

    fn read_provider(&self) -> Result<RootProvider<Http<Client>>, QueryError> {
        let url = self
            .rpc_url
            .parse()
            .map_err(|e| QueryError::Fatal(format!("invalid RPC URL: {e}")))?;
        Ok(ProviderBuilder::new().on_http(url))
    }
}

#[async_trait]
impl ChainSource for EvmChainClient {
    fn sender(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    async fn head_number(&self) -> Result<u64, QueryError> {
        let provider = self.read_provider()?;
        provider
            .get_block_number()
            .await
            .map_err(QueryError::from_rpc)
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, QueryError> {
        let provider = self.read_provider()?;
        provider.get_logs(filter).await.map_err(QueryError::from_rpc)
    }

    async fn nonce(&self, account: Address) -> Result<u64, QueryError> {
        let provider = self.read_provider()?;
        provider
            .get_transaction_count(account)
            .await
            .map_err(QueryError::from_rpc)
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<B256, SubmitError> {
        let signer = self.signer.clone().ok_or(SubmitError::NoSigner)?;
        let wallet = EthereumWallet::from(signer);

        let url = self
            .rpc_url
            .parse()
            .map_err(|e| SubmitError::Submission(format!("invalid RPC URL: {e}")))?;
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(url);

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| SubmitError::Submission(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "transaction submitted");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, SubmitError> {
        let provider = self
            .read_provider()
            .map_err(|e| SubmitError::Receipt(tx_hash, e.to_string()))?;

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(500);

        while start.elapsed() < self.receipt_timeout {
            if let Some(receipt) = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| SubmitError::Receipt(tx_hash, e.to_string()))?
            {
                return Ok(TxReceipt {
                    tx_hash,
                    status: receipt.status(),
                    block_number: receipt.block_number,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(SubmitError::ConfirmationTimeout(
            tx_hash,
            self.receipt_timeout,
        ))
    }
}
