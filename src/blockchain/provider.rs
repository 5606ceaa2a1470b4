// src/blockchain/provider.rs

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{ChainClient, ClientError, ClientFactory};
use super::networks::{normalize_network_name, render_rpc_template, NetworkRegistry};
use crate::config::Config;

const URL_SCHEMES: [&str; 4] = ["http://", "https://", "ws://", "wss://"];

/// Returns true when `network` should be treated as a literal RPC endpoint.
pub fn is_rpc_url(network: &str) -> bool {
    let lower = network.trim().to_ascii_lowercase();
    URL_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// Caller input identifying which chain to talk to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSpecifier {
    /// Registered network name or literal RPC URL.
    pub network: Option<String>,
    /// Chain ID the caller expects to reach.
    pub chain_id: Option<u64>,
}

impl ProviderSpecifier {
    pub fn network(name: impl Into<String>) -> Self {
        Self {
            network: Some(name.into()),
            chain_id: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}

/// Normalized cache key. The cache never looks at raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    ByName(String),
    ByUrl(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::ByName(name) => write!(f, "{}", name),
            CacheKey::ByUrl(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unknown network '{requested}'. Supported networks: {}", .supported.join(", "))]
    UnknownNetwork {
        requested: String,
        supported: Vec<String>,
    },
    #[error("chain ID mismatch for {subject}: expected {expected}, got {actual}")]
    ChainIdMismatch {
        subject: String,
        expected: u64,
        actual: u64,
    },
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },
}

/// A connected client shared by every call using the same cache key.
pub struct ResolvedProvider {
    pub key: CacheKey,
    /// Live chain ID, verified at construction.
    pub chain_id: u64,
    /// Canonical network name when the chain is in the registry.
    pub network_name: Option<String>,
    pub currency_symbol: String,
    pub endpoint: String,
    pub client: Arc<dyn ChainClient>,
    pub created_at: DateTime<Utc>,
}

impl ResolvedProvider {
    /// Network name if known, else the endpoint.
    pub fn label(&self) -> &str {
        self.network_name.as_deref().unwrap_or(&self.endpoint)
    }
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("key", &self.key)
            .field("chain_id", &self.chain_id)
            .field("endpoint", &self.endpoint)
            .field("created_at", &self.created_at)
            .finish()
    }
}

// What a specifier resolves to before any connection is made.
struct Target {
    key: CacheKey,
    endpoint: String,
    // Registry chain ID for named networks; the live client must agree.
    expected_chain_id: Option<u64>,
}

/// Turns network specifiers into connected, cached clients.
pub struct ProviderResolver {
    registry: Arc<NetworkRegistry>,
    factory: Arc<dyn ClientFactory>,
    default_network: String,
    rpc_overrides: HashMap<String, String>,
    api_key: Option<String>,
    // One slot per key. The slot mutex makes construction single-flight:
    // concurrent first calls for a key wait for one connection instead of
    // racing to build several.
    cache: DashMap<CacheKey, Arc<Mutex<Option<Arc<ResolvedProvider>>>>>,
}

impl ProviderResolver {
    pub fn new(
        registry: Arc<NetworkRegistry>,
        factory: Arc<dyn ClientFactory>,
        config: &Config,
    ) -> Self {
        // Overrides may name a network by alias; key them by canonical name.
        let rpc_overrides = config
            .network_rpc_urls
            .iter()
            .map(|(name, url)| {
                let key = match registry.lookup(name) {
                    Some(descriptor) => normalize_network_name(&descriptor.name),
                    None => {
                        warn!("NETWORK_RPC_URLS entry '{}' names no known network", name);
                        normalize_network_name(name)
                    }
                };
                (key, url.clone())
            })
            .collect();
        Self {
            registry,
            factory,
            default_network: config.default_network.clone(),
            rpc_overrides,
            api_key: config.rpc_api_key.clone(),
            cache: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Number of cached providers.
    pub fn cached(&self) -> usize {
        self.cache
            .iter()
            .filter(|slot| slot.value().try_lock().map(|s| s.is_some()).unwrap_or(true))
            .count()
    }

    /// Resolves `spec` to a connected provider, reusing a cached one when the
    /// normalized key has been seen before.
    pub async fn resolve(
        &self,
        spec: &ProviderSpecifier,
    ) -> Result<Arc<ResolvedProvider>, ResolutionError> {
        let target = self.target_for(spec)?;

        let slot = self
            .cache
            .entry(target.key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let key = target.key.clone();
        let outcome = {
            let mut guard = slot.lock().await;
            match guard.clone() {
                Some(hit) => {
                    debug!("Provider cache hit for {}", key);
                    Ok(hit)
                }
                None => self.connect(target).await.map(|connected| {
                    let fresh = Arc::new(connected);
                    *guard = Some(fresh.clone());
                    fresh
                }),
            }
        };

        let resolved = match outcome {
            Ok(resolved) => resolved,
            Err(err) => {
                // Drop the empty slot unless another caller is filling it.
                self.cache.remove_if(&key, |_, current| {
                    Arc::ptr_eq(current, &slot)
                        && current.try_lock().map(|g| g.is_none()).unwrap_or(false)
                });
                return Err(err);
            }
        };

        // Literal URLs accept the caller's chain ID as an assertion about the
        // live endpoint. Named networks were checked in `target_for`.
        if let Some(asserted) = spec.chain_id {
            if asserted != resolved.chain_id {
                return Err(ResolutionError::ChainIdMismatch {
                    subject: resolved.endpoint.clone(),
                    expected: asserted,
                    actual: resolved.chain_id,
                });
            }
        }

        Ok(resolved)
    }

    fn target_for(&self, spec: &ProviderSpecifier) -> Result<Target, ResolutionError> {
        let requested = spec
            .network
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let network = match (requested, spec.chain_id) {
            (Some(network), _) => network.to_string(),
            (None, Some(chain_id)) => self
                .registry
                .lookup_by_chain_id(chain_id)
                .map(|n| n.name.clone())
                .ok_or_else(|| ResolutionError::UnknownNetwork {
                    requested: format!("chain ID {}", chain_id),
                    supported: self.registry.names(),
                })?,
            (None, None) => self.default_network.clone(),
        };

        if is_rpc_url(&network) {
            url::Url::parse(&network).map_err(|e| ResolutionError::ConnectionFailed {
                endpoint: network.clone(),
                reason: format!("invalid RPC URL: {}", e),
            })?;
            return Ok(Target {
                key: CacheKey::ByUrl(network.clone()),
                endpoint: network,
                expected_chain_id: None,
            });
        }

        let descriptor =
            self.registry
                .lookup(&network)
                .ok_or_else(|| ResolutionError::UnknownNetwork {
                    requested: network.clone(),
                    supported: self.registry.names(),
                })?;

        if let Some(asserted) = spec.chain_id {
            if asserted != descriptor.chain_id {
                return Err(ResolutionError::ChainIdMismatch {
                    subject: format!("network '{}'", descriptor.name),
                    expected: descriptor.chain_id,
                    actual: asserted,
                });
            }
        }

        let template = self
            .rpc_overrides
            .get(&normalize_network_name(&descriptor.name))
            .unwrap_or(&descriptor.rpc_template);
        let endpoint = render_rpc_template(template, self.api_key.as_deref()).ok_or_else(|| {
            ResolutionError::ConnectionFailed {
                endpoint: template.clone(),
                reason: format!(
                    "RPC endpoint for network '{}' needs RPC_API_KEY, which is not set",
                    descriptor.name
                ),
            }
        })?;

        Ok(Target {
            key: CacheKey::ByName(descriptor.name.clone()),
            endpoint,
            expected_chain_id: Some(descriptor.chain_id),
        })
    }

    async fn connect(&self, target: Target) -> Result<ResolvedProvider, ResolutionError> {
        let failed = |err: ClientError| ResolutionError::ConnectionFailed {
            endpoint: target.endpoint.clone(),
            reason: match err {
                ClientError::Unreachable(reason) | ClientError::Rpc(reason) => reason,
            },
        };

        let client = self.factory.connect(&target.endpoint).await.map_err(failed)?;
        let live_chain_id = client.chain_id().await.map_err(failed)?;

        if let Some(expected) = target.expected_chain_id {
            if expected != live_chain_id {
                return Err(ResolutionError::ChainIdMismatch {
                    subject: format!("{} ({})", target.key, target.endpoint),
                    expected,
                    actual: live_chain_id,
                });
            }
        }

        let known = self.registry.lookup_by_chain_id(live_chain_id);
        let network_name = match &target.key {
            CacheKey::ByName(name) => Some(name.clone()),
            CacheKey::ByUrl(_) => None,
        };
        let currency_symbol = known
            .map(|n| n.native_currency_symbol.clone())
            .unwrap_or_else(|| "ETH".to_string());

        info!(
            "Connected provider {} (chain ID {})",
            target.key, live_chain_id
        );

        Ok(ResolvedProvider {
            key: target.key,
            chain_id: live_chain_id,
            network_name,
            currency_symbol,
            endpoint: target.endpoint,
            client,
            created_at: Utc::now(),
        })
    }
}
