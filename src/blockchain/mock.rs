//! In-memory chain client for tests and offline runs.
//!
//! A [`MockChain`] answers reads from tables filled in by the caller and
//! records every submitted transaction. [`MockClientFactory`] hands out chains
//! per endpoint and counts how many clients it has built.

use async_trait::async_trait;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Block, BlockId, Bytes, Transaction,
    TransactionReceipt, H256, U256,
};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::client::{ChainClient, ClientError, ClientFactory, FeeData};

/// A transaction accepted by [`MockChain::send_transaction`].
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub from: Address,
    pub chain_id: Option<u64>,
    pub tx: TypedTransaction,
    pub hash: H256,
}

#[derive(Default)]
struct MockState {
    block_number: u64,
    gas_price: U256,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    // (contract, calldata) -> result
    calls: HashMap<(Address, Vec<u8>), Result<Bytes, ClientError>>,
    blocks: HashMap<u64, Block<H256>>,
    transactions: HashMap<H256, Transaction>,
    receipts: HashMap<H256, TransactionReceipt>,
    names: HashMap<String, Address>,
    send_error: Option<ClientError>,
    sent: Vec<SentTransaction>,
}

/// Scriptable [`ChainClient`].
pub struct MockChain {
    chain_id: u64,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(MockState {
                gas_price: U256::from(1_000_000_000u64),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not poison the other tests' view.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_block_number(&self, number: u64) {
        self.state().block_number = number;
    }

    pub fn set_gas_price(&self, wei: U256) {
        self.state().gas_price = wei;
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state().balances.insert(address, wei);
    }

    pub fn set_nonce(&self, address: Address, nonce: U256) {
        self.state().nonces.insert(address, nonce);
    }

    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.state().code.insert(address, code.into());
    }

    /// Answers `eth_call` to `contract` with exactly `calldata`.
    pub fn set_call(&self, contract: Address, calldata: impl Into<Bytes>, result: impl Into<Bytes>) {
        self.state()
            .calls
            .insert((contract, calldata.into().to_vec()), Ok(result.into()));
    }

    /// Makes `eth_call` to `contract` with `calldata` fail.
    pub fn set_call_error(&self, contract: Address, calldata: impl Into<Bytes>, error: ClientError) {
        self.state()
            .calls
            .insert((contract, calldata.into().to_vec()), Err(error));
    }

    pub fn set_block(&self, number: u64, block: Block<H256>) {
        self.state().blocks.insert(number, block);
    }

    pub fn set_transaction(&self, tx: Transaction) {
        self.state().transactions.insert(tx.hash, tx);
    }

    pub fn set_receipt(&self, receipt: TransactionReceipt) {
        self.state()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    pub fn set_ens_name(&self, name: &str, address: Address) {
        self.state().names.insert(name.to_lowercase(), address);
    }

    /// Every later `send_transaction` fails with `error`.
    pub fn fail_sends_with(&self, error: ClientError) {
        self.state().send_error = Some(error);
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state().sent.clone()
    }

    fn block_key(&self, state: &MockState, id: BlockId) -> Option<u64> {
        match id {
            BlockId::Number(number) => match number.as_number() {
                Some(n) => Some(n.as_u64()),
                None => Some(state.block_number),
            },
            BlockId::Hash(hash) => state
                .blocks
                .iter()
                .find(|(_, block)| block.hash == Some(hash))
                .map(|(n, _)| *n),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, ClientError> {
        Ok(self.state().block_number)
    }

    async fn balance(&self, address: Address, _block: Option<BlockId>) -> Result<U256, ClientError> {
        Ok(self.state().balances.get(&address).copied().unwrap_or_default())
    }

    async fn transaction_count(
        &self,
        address: Address,
        _block: Option<BlockId>,
    ) -> Result<U256, ClientError> {
        Ok(self.state().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn block(&self, id: BlockId) -> Result<Option<Block<H256>>, ClientError> {
        let state = self.state();
        Ok(self
            .block_key(&state, id)
            .and_then(|n| state.blocks.get(&n).cloned()))
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>, ClientError> {
        Ok(self.state().transactions.get(&hash).cloned())
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        Ok(self.state().receipts.get(&hash).cloned())
    }

    async fn code(&self, address: Address) -> Result<Bytes, ClientError> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, ClientError> {
        Ok(self.state().gas_price)
    }

    async fn fee_data(&self) -> Result<FeeData, ClientError> {
        let gas_price = self.state().gas_price;
        Ok(FeeData {
            gas_price,
            max_fee_per_gas: Some(gas_price * 2),
            max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
        })
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ClientError> {
        let to = tx
            .to_addr()
            .copied()
            .ok_or_else(|| ClientError::Rpc("eth_call requires a target address".into()))?;
        let data = tx.data().map(|d| d.to_vec()).unwrap_or_default();
        let state = self.state();
        match state.calls.get(&(to, data)) {
            Some(result) => result.clone(),
            // An account without code answers every call with empty data.
            None if !state.code.contains_key(&to) => Ok(Bytes::default()),
            None => Err(ClientError::Rpc("execution reverted".into())),
        }
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, ClientError> {
        Ok(U256::from(21_000u64))
    }

    async fn send_transaction(
        &self,
        signer: LocalWallet,
        tx: TypedTransaction,
    ) -> Result<H256, ClientError> {
        let mut state = self.state();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        let from = signer.address();
        let index = state.sent.len() as u64;
        let mut seed = from.as_bytes().to_vec();
        seed.extend_from_slice(&index.to_be_bytes());
        let hash = H256::from(keccak256(seed));
        state.sent.push(SentTransaction {
            from,
            chain_id: Some(signer.chain_id()),
            tx,
            hash,
        });
        Ok(hash)
    }

    async fn resolve_name(&self, name: &str) -> Result<Address, ClientError> {
        self.state()
            .names
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| ClientError::Rpc(format!("ens name not found: {}", name)))
    }

    async fn lookup_address(&self, address: Address) -> Result<String, ClientError> {
        self.state()
            .names
            .iter()
            .find(|(_, a)| **a == address)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| ClientError::Rpc(format!("ens name not found: {:?}", address)))
    }
}

/// Serves a fixed [`MockChain`] per endpoint and counts constructions.
#[derive(Default)]
pub struct MockClientFactory {
    chains: Mutex<HashMap<String, Arc<MockChain>>>,
    unreachable: Mutex<HashSet<String>>,
    connects: AtomicUsize,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `chain` as the node behind `endpoint`.
    pub fn add_chain(&self, endpoint: &str, chain: Arc<MockChain>) {
        if let Ok(mut chains) = self.chains.lock() {
            chains.insert(endpoint.to_string(), chain);
        }
    }

    /// Makes connecting to `endpoint` fail as if the host were down.
    pub fn set_unreachable(&self, endpoint: &str) {
        if let Ok(mut down) = self.unreachable.lock() {
            down.insert(endpoint.to_string());
        }
    }

    /// Number of clients constructed so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn ChainClient>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let down = self
            .unreachable
            .lock()
            .map(|set| set.contains(endpoint))
            .unwrap_or(false);
        if down {
            return Err(ClientError::Unreachable(format!("connection refused: {}", endpoint)));
        }
        let chain = self
            .chains
            .lock()
            .ok()
            .and_then(|chains| chains.get(endpoint).cloned())
            .ok_or_else(|| ClientError::Unreachable(format!("no route to host: {}", endpoint)))?;
        Ok(chain as Arc<dyn ChainClient>)
    }
}
