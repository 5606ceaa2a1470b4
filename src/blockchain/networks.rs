//! Static table of supported networks.
//!
//! The registry is built once and never mutated, so it can be shared across
//! tasks without locking. Names are matched case-insensitively; a handful of
//! common aliases ("ethereum", "matic", ...) resolve to their canonical entry.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Placeholder substituted with `RPC_API_KEY` inside RPC templates.
pub const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// One row of the network table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub name: String,
    pub chain_id: u64,
    pub native_currency_symbol: String,
    pub rpc_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl NetworkDescriptor {
    fn new(
        name: &str,
        chain_id: u64,
        symbol: &str,
        rpc_template: &str,
        explorer_url: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            native_currency_symbol: symbol.to_string(),
            rpc_template: rpc_template.to_string(),
            explorer_url: explorer_url.map(str::to_string),
        }
    }
}

/// Read-only lookup of network descriptors.
#[derive(Debug)]
pub struct NetworkRegistry {
    networks: Vec<NetworkDescriptor>,
    // normalized name or alias -> index into `networks`
    index: HashMap<String, usize>,
}

lazy_static! {
    static ref BUILTIN: Arc<NetworkRegistry> = Arc::new(NetworkRegistry::new(
        builtin_networks(),
        &[
            ("ethereum", "mainnet"),
            ("eth", "mainnet"),
            ("homestead", "mainnet"),
            ("main", "mainnet"),
            ("arbitrum-one", "arbitrum"),
            ("op", "optimism"),
            ("matic", "polygon"),
            ("bnb", "bsc"),
            ("binance", "bsc"),
            ("avax", "avalanche"),
            ("zksync-era", "zksync"),
        ],
    ));
}

fn builtin_networks() -> Vec<NetworkDescriptor> {
    vec![
        NetworkDescriptor::new(
            "mainnet",
            1,
            "ETH",
            "https://ethereum-rpc.publicnode.com",
            Some("https://etherscan.io"),
        ),
        NetworkDescriptor::new(
            "sepolia",
            11155111,
            "ETH",
            "https://ethereum-sepolia-rpc.publicnode.com",
            Some("https://sepolia.etherscan.io"),
        ),
        NetworkDescriptor::new(
            "holesky",
            17000,
            "ETH",
            "https://ethereum-holesky-rpc.publicnode.com",
            Some("https://holesky.etherscan.io"),
        ),
        NetworkDescriptor::new(
            "arbitrum",
            42161,
            "ETH",
            "https://arb1.arbitrum.io/rpc",
            Some("https://arbiscan.io"),
        ),
        NetworkDescriptor::new(
            "optimism",
            10,
            "ETH",
            "https://mainnet.optimism.io",
            Some("https://optimistic.etherscan.io"),
        ),
        NetworkDescriptor::new(
            "base",
            8453,
            "ETH",
            "https://mainnet.base.org",
            Some("https://basescan.org"),
        ),
        NetworkDescriptor::new(
            "polygon",
            137,
            "POL",
            "https://polygon-rpc.com",
            Some("https://polygonscan.com"),
        ),
        NetworkDescriptor::new(
            "bsc",
            56,
            "BNB",
            "https://bsc-dataseed.binance.org",
            Some("https://bscscan.com"),
        ),
        NetworkDescriptor::new(
            "avalanche",
            43114,
            "AVAX",
            "https://api.avax.network/ext/bc/C/rpc",
            Some("https://snowtrace.io"),
        ),
        NetworkDescriptor::new(
            "linea",
            59144,
            "ETH",
            "https://rpc.linea.build",
            Some("https://lineascan.build"),
        ),
        NetworkDescriptor::new(
            "zksync",
            324,
            "ETH",
            "https://mainnet.era.zksync.io",
            Some("https://explorer.zksync.io"),
        ),
        NetworkDescriptor::new(
            "scroll",
            534352,
            "ETH",
            "https://rpc.scroll.io",
            Some("https://scrollscan.com"),
        ),
    ]
}

/// Lowercases and unifies separators so "Arbitrum One" and "arbitrum_one"
/// hit the same entry.
pub fn normalize_network_name(input: &str) -> String {
    let mut s = input.trim().to_lowercase().replace([' ', '_'], "-");
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s
}

impl NetworkRegistry {
    /// Builds a registry from descriptors in registration order.
    /// Aliases pointing at unknown names are ignored.
    pub fn new(networks: Vec<NetworkDescriptor>, aliases: &[(&str, &str)]) -> Self {
        let mut index = HashMap::new();
        for (i, network) in networks.iter().enumerate() {
            index.insert(normalize_network_name(&network.name), i);
        }
        for (alias, target) in aliases {
            if let Some(&i) = index.get(&normalize_network_name(target)) {
                index.entry(normalize_network_name(alias)).or_insert(i);
            }
        }
        Self { networks, index }
    }

    /// The table shipped with the server.
    pub fn builtin() -> Arc<NetworkRegistry> {
        BUILTIN.clone()
    }

    /// Case-insensitive lookup by name or alias.
    pub fn lookup(&self, name: &str) -> Option<&NetworkDescriptor> {
        self.index
            .get(&normalize_network_name(name))
            .map(|&i| &self.networks[i])
    }

    pub fn lookup_by_chain_id(&self, chain_id: u64) -> Option<&NetworkDescriptor> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> &[NetworkDescriptor] {
        &self.networks
    }

    pub fn names(&self) -> Vec<String> {
        self.networks.iter().map(|n| n.name.clone()).collect()
    }
}

/// Fills the `{api_key}` placeholder. Returns `None` when the template needs a
/// key and none is configured.
pub fn render_rpc_template(template: &str, api_key: Option<&str>) -> Option<String> {
    if !template.contains(API_KEY_PLACEHOLDER) {
        return Some(template.to_string());
    }
    api_key.map(|key| template.replace(API_KEY_PLACEHOLDER, key))
}
