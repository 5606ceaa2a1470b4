// src/config.rs

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;

/// Environment variable that holds the process wallet key.
///
/// Read once at startup and written by `WalletManager::persist`.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// Network name or literal RPC URL used when a tool call names no provider.
    pub default_network: String,
    /// Per-network RPC URL overrides, keyed by lowercase network name.
    /// Values may contain an `{api_key}` placeholder.
    pub network_rpc_urls: HashMap<String, String>,
    /// Substituted for `{api_key}` in RPC templates.
    pub rpc_api_key: Option<String>,
    /// Upper bound on a single chain-client request.
    pub rpc_timeout_secs: u64,

    // Wallet settings
    pub private_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            default_network: "mainnet".to_string(),
            network_rpc_urls: HashMap::new(),
            rpc_api_key: None,
            rpc_timeout_secs: 30,
            private_key: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let network_rpc_urls = match env::var("NETWORK_RPC_URLS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let parsed: HashMap<String, String> = serde_json::from_str(&raw)
                    .context("NETWORK_RPC_URLS must be a JSON map of network name -> RPC URL")?;
                parsed
                    .into_iter()
                    .map(|(name, url)| (name.trim().to_lowercase(), url))
                    .collect()
            }
            _ => HashMap::new(),
        };

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .context("PORT must be a valid number")?,
            default_network: env::var("DEFAULT_NETWORK")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.default_network),
            network_rpc_urls,
            rpc_api_key: env::var("RPC_API_KEY").ok().filter(|v| !v.is_empty()),
            rpc_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.rpc_timeout_secs.to_string())
                .parse()
                .context("RPC_TIMEOUT_SECS must be a valid number")?,
            private_key: env::var(PRIVATE_KEY_ENV).ok().filter(|v| !v.is_empty()),
        })
    }
}
