// src/lib.rs

use std::sync::Arc;
use std::time::Duration;

pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod tools;

use blockchain::client::{ClientFactory, EthersClientFactory};
use blockchain::networks::NetworkRegistry;
use blockchain::provider::ProviderResolver;
use blockchain::wallet_manager::{WalletError, WalletManager};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::Config>,
    /// Static table of supported networks
    pub registry: Arc<NetworkRegistry>,
    /// Cached, chain-checked connections
    pub resolver: Arc<ProviderResolver>,
    /// The single active signer
    pub wallets: WalletManager,
}

impl AppState {
    /// Builds the state with clients coming from `factory`. A `PRIVATE_KEY`
    /// in the config becomes the active wallet.
    pub fn new(config: config::Config, factory: Arc<dyn ClientFactory>) -> Result<Self, WalletError> {
        let registry = NetworkRegistry::builtin();
        let resolver = Arc::new(ProviderResolver::new(registry.clone(), factory, &config));
        let wallets = match config.private_key.as_deref() {
            Some(key) => WalletManager::with_private_key(key)?,
            None => WalletManager::new(),
        };
        Ok(Self {
            config: Arc::new(config),
            registry,
            resolver,
            wallets,
        })
    }

    /// Production state talking to real nodes through ethers.
    pub fn from_config(config: config::Config) -> Result<Self, WalletError> {
        let factory = Arc::new(EthersClientFactory::new(Duration::from_secs(
            config.rpc_timeout_secs,
        )));
        Self::new(config, factory)
    }
}
