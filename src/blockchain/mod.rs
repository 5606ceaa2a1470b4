// src/blockchain/mod.rs

pub mod client;
pub mod contracts;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod networks;
pub mod provider;
pub mod wallet_manager;

pub use client::{ChainClient, ClientError, ClientFactory};
pub use provider::{ProviderResolver, ProviderSpecifier, ResolvedProvider};
