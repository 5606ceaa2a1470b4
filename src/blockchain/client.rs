//! Chain client abstraction for EVM-compatible networks.
//!
//! Everything above this module talks to the chain through [`ChainClient`],
//! so the resolver and tool handlers never touch transport details. The
//! production implementation wraps an ethers `Provider` over HTTP or
//! WebSocket and bounds every request with a timeout.

use async_trait::async_trait;
use ethers::middleware::{signer::SignerMiddlewareError, SignerMiddleware};
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Block, BlockId, Bytes, Transaction,
    TransactionReceipt, H256, U256,
};
use ethers_providers::{
    Http, JsonRpcClient, Middleware, Provider, ProviderError, RpcError, Ws,
};
use ethers_signers::LocalWallet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the underlying chain client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The endpoint could not be reached, answered garbage, or timed out.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    /// The node answered with an error (reverts land here).
    #[error("{0}")]
    Rpc(String),
}

/// Gas pricing snapshot. EIP-1559 fields are absent on legacy chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: U256,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Network-bound operations the tool layer needs from a node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain ID reported live by the endpoint.
    async fn chain_id(&self) -> Result<u64, ClientError>;
    async fn block_number(&self) -> Result<u64, ClientError>;
    async fn balance(&self, address: Address, block: Option<BlockId>) -> Result<U256, ClientError>;
    async fn transaction_count(
        &self,
        address: Address,
        block: Option<BlockId>,
    ) -> Result<U256, ClientError>;
    async fn block(&self, id: BlockId) -> Result<Option<Block<H256>>, ClientError>;
    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ClientError>;
    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ClientError>;
    async fn code(&self, address: Address) -> Result<Bytes, ClientError>;
    async fn gas_price(&self) -> Result<U256, ClientError>;
    async fn fee_data(&self) -> Result<FeeData, ClientError>;
    /// Read-only `eth_call` against the latest block.
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ClientError>;
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ClientError>;
    /// Fills nonce, gas and fees, signs with `signer` and broadcasts.
    /// `signer` must already carry the target chain ID.
    async fn send_transaction(
        &self,
        signer: LocalWallet,
        tx: TypedTransaction,
    ) -> Result<H256, ClientError>;
    async fn resolve_name(&self, name: &str) -> Result<Address, ClientError>;
    async fn lookup_address(&self, address: Address) -> Result<String, ClientError>;
}

/// Builds clients for endpoints. The resolver is the only caller.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ChainClient>, ClientError>;
}

fn from_provider_error(err: ProviderError) -> ClientError {
    if let Some(resp) = err.as_error_response() {
        let mut message = resp.message.clone();
        if let Some(data) = &resp.data {
            message.push_str(&format!(" (data: {})", data));
        }
        return ClientError::Rpc(message);
    }
    match err {
        // Transport failures and undecodable bodies both mean the endpoint is
        // not a usable JSON-RPC node.
        ProviderError::JsonRpcClientError(e) => ClientError::Unreachable(e.to_string()),
        other => ClientError::Rpc(other.to_string()),
    }
}

/// [`ChainClient`] backed by an ethers provider.
#[derive(Debug, Clone)]
pub struct EthersClient<P> {
    provider: Provider<P>,
    timeout: Duration,
}

impl<P: JsonRpcClient + Clone + 'static> EthersClient<P> {
    pub fn new(provider: Provider<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(from_provider_error),
            Err(_) => Err(ClientError::Unreachable(format!(
                "request timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl<P: JsonRpcClient + Clone + 'static> ChainClient for EthersClient<P> {
    async fn chain_id(&self) -> Result<u64, ClientError> {
        let id = self.bounded(self.provider.get_chainid()).await?;
        if id > U256::from(u64::MAX) {
            return Err(ClientError::Rpc(format!("chain ID {} does not fit in 64 bits", id)));
        }
        Ok(id.as_u64())
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.bounded(self.provider.get_block_number()).await?.as_u64())
    }

    async fn balance(&self, address: Address, block: Option<BlockId>) -> Result<U256, ClientError> {
        self.bounded(self.provider.get_balance(address, block)).await
    }

    async fn transaction_count(
        &self,
        address: Address,
        block: Option<BlockId>,
    ) -> Result<U256, ClientError> {
        self.bounded(self.provider.get_transaction_count(address, block))
            .await
    }

    async fn block(&self, id: BlockId) -> Result<Option<Block<H256>>, ClientError> {
        self.bounded(self.provider.get_block(id)).await
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ClientError> {
        self.bounded(self.provider.get_transaction(hash)).await
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        self.bounded(self.provider.get_transaction_receipt(hash))
            .await
    }

    async fn code(&self, address: Address) -> Result<Bytes, ClientError> {
        self.bounded(self.provider.get_code(address, None)).await
    }

    async fn gas_price(&self) -> Result<U256, ClientError> {
        self.bounded(self.provider.get_gas_price()).await
    }

    async fn fee_data(&self) -> Result<FeeData, ClientError> {
        let gas_price = self.gas_price().await?;
        // Legacy chains reject the fee-history call; report gas price only.
        let eip1559 = self
            .bounded(self.provider.estimate_eip1559_fees(None))
            .await
            .ok();
        Ok(FeeData {
            gas_price,
            max_fee_per_gas: eip1559.map(|(max_fee, _)| max_fee),
            max_priority_fee_per_gas: eip1559.map(|(_, priority)| priority),
        })
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ClientError> {
        self.bounded(self.provider.call(tx, None)).await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ClientError> {
        self.bounded(self.provider.estimate_gas(tx, None)).await
    }

    async fn send_transaction(
        &self,
        signer: LocalWallet,
        tx: TypedTransaction,
    ) -> Result<H256, ClientError> {
        let client = SignerMiddleware::new(self.provider.clone(), signer);
        let sent = tokio::time::timeout(self.timeout, async {
            client
                .send_transaction(tx, None)
                .await
                .map(|pending| pending.tx_hash())
        })
        .await;
        match sent {
            Ok(Ok(hash)) => Ok(hash),
            Ok(Err(SignerMiddlewareError::MiddlewareError(e))) => Err(from_provider_error(e)),
            Ok(Err(other)) => Err(ClientError::Rpc(other.to_string())),
            Err(_) => Err(ClientError::Unreachable(format!(
                "transaction submission timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn resolve_name(&self, name: &str) -> Result<Address, ClientError> {
        self.bounded(self.provider.resolve_name(name)).await
    }

    async fn lookup_address(&self, address: Address) -> Result<String, ClientError> {
        self.bounded(self.provider.lookup_address(address)).await
    }
}

/// Connects ethers providers, choosing the transport from the URL scheme.
#[derive(Debug, Clone)]
pub struct EthersClientFactory {
    timeout: Duration,
}

impl EthersClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ClientFactory for EthersClientFactory {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ChainClient>, ClientError> {
        let scheme = endpoint.to_ascii_lowercase();
        if scheme.starts_with("ws://") || scheme.starts_with("wss://") {
            let provider = tokio::time::timeout(self.timeout, Provider::<Ws>::connect(endpoint))
                .await
                .map_err(|_| {
                    ClientError::Unreachable(format!(
                        "websocket handshake timed out after {}s",
                        self.timeout.as_secs()
                    ))
                })?
                .map_err(|e| ClientError::Unreachable(e.to_string()))?;
            return Ok(Arc::new(EthersClient::new(provider, self.timeout)));
        }

        let provider = Provider::<Http>::try_from(endpoint)
            .map_err(|e| ClientError::Unreachable(format!("invalid RPC URL: {}", e)))?;
        Ok(Arc::new(EthersClient::new(provider, self.timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_factory_accepts_plain_url() {
        let factory = EthersClientFactory::new(Duration::from_secs(1));
        assert!(factory.connect("http://localhost:8545").await.is_ok());
    }

    #[tokio::test]
    async fn test_http_factory_rejects_malformed_url() {
        let factory = EthersClientFactory::new(Duration::from_secs(1));
        let err = factory.connect("http://").await.err().unwrap();
        assert!(matches!(err, ClientError::Unreachable(msg) if msg.contains("invalid RPC URL")));
    }
}
