//! Tool catalog and dispatcher.
//!
//! Every tool is a [`ToolSpec`] plus an async handler. A call runs
//! `validate -> handler` and whatever the handler returns, success or
//! [`ToolError`], leaves [`dispatch`] as a [`ToolResponse`].

use ethers_core::types::{transaction::eip2718::TypedTransaction, Address, H256};
use ethers_core::utils::to_checksum;
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub mod contract;
pub mod errors;
pub mod network;
pub mod nft;
pub mod schema;
pub mod tokens;
pub mod units;
pub mod validation;
pub mod wallet;

use crate::blockchain::provider::ResolvedProvider;
use crate::blockchain::wallet_manager::WalletState;
use crate::mcp::protocol::ToolResponse;
use crate::AppState;
use errors::{classify, to_envelope, unknown_tool, ToolError};
use schema::ToolSpec;
use validation::{validate, ValidatedArgs};

pub type ToolResult = Result<ToolResponse, ToolError>;

type Handler = Box<dyn for<'a> Fn(&'a AppState, ValidatedArgs) -> BoxFuture<'a, ToolResult> + Send + Sync>;

pub struct ToolDef {
    pub spec: ToolSpec,
    handler: Handler,
}

impl ToolDef {
    pub fn new<F>(spec: ToolSpec, handler: F) -> Self
    where
        F: for<'a> Fn(&'a AppState, ValidatedArgs) -> BoxFuture<'a, ToolResult> + Send + Sync + 'static,
    {
        Self {
            spec,
            handler: Box::new(handler),
        }
    }
}

/// Pairs a spec with an `async fn(&AppState, ValidatedArgs) -> ToolResult`.
macro_rules! tool {
    ($spec:expr, $handler:path) => {
        $crate::tools::ToolDef::new($spec, |state, args| {
            ::futures::FutureExt::boxed($handler(state, args))
        })
    };
}
pub(crate) use tool;

lazy_static! {
    static ref CATALOG: Vec<ToolDef> = {
        let mut all = Vec::new();
        all.extend(network::tools());
        all.extend(units::tools());
        all.extend(wallet::tools());
        all.extend(tokens::tools());
        all.extend(nft::tools());
        all.extend(contract::tools());
        all
    };
}

pub fn catalog() -> &'static [ToolDef] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static ToolDef> {
    CATALOG.iter().find(|t| t.spec.name == name)
}

/// Runs one tool call to completion. Never fails: every error becomes an
/// `isError` envelope.
pub async fn dispatch(state: &AppState, name: &str, arguments: &Value) -> ToolResponse {
    let Some(tool) = find(name) else {
        warn!("Call to unknown tool '{}'", name);
        return unknown_tool(name);
    };

    info!("Calling tool {}", name);
    let outcome = match validate(&tool.spec, arguments) {
        Ok(args) => (tool.handler)(state, args).await,
        Err(errors) => Err(ToolError::Validation(errors)),
    };

    match outcome {
        Ok(response) => response,
        Err(err) => {
            warn!("Tool {} failed ({}): {}", name, classify(&err), err);
            to_envelope(&err)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by the handler groups

pub(crate) async fn resolve(state: &AppState, args: &ValidatedArgs) -> Result<Arc<ResolvedProvider>, ToolError> {
    Ok(state.resolver.resolve(&args.provider()).await?)
}

/// Signs `tx` with the active wallet for `provider`'s chain and broadcasts it.
pub(crate) async fn submit(
    provider: &ResolvedProvider,
    wallet: &WalletState,
    mut tx: TypedTransaction,
) -> Result<H256, ToolError> {
    tx.set_from(wallet.address);
    tx.set_chain_id(provider.chain_id);
    let hash = provider
        .client
        .send_transaction(wallet.signer_for_chain(provider.chain_id), tx)
        .await?;
    info!("Submitted transaction {:?} on {}", hash, provider.label());
    Ok(hash)
}

/// Success envelope for a broadcast transaction.
pub(crate) fn submitted(state: &AppState, provider: &ResolvedProvider, hash: H256, summary: String) -> ToolResponse {
    let explorer = state
        .registry
        .lookup_by_chain_id(provider.chain_id)
        .and_then(|n| n.explorer_url.as_ref())
        .map(|url| format!("{}/tx/{:?}", url, hash));
    ToolResponse::json(&json!({
        "summary": summary,
        "transactionHash": format!("{:?}", hash),
        "network": provider.label(),
        "chainId": provider.chain_id,
        "explorerUrl": explorer,
    }))
}

pub(crate) fn checksum(address: Address) -> String {
    to_checksum(&address, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tool_names_are_unique() {
        let mut seen = HashSet::new();
        for tool in catalog() {
            assert!(seen.insert(tool.spec.name), "duplicate tool {}", tool.spec.name);
        }
        assert!(find("getWalletBalance").is_some());
        assert!(find("getwalletbalance").is_none());
    }

    #[test]
    fn test_every_tool_has_documented_fields() {
        for tool in catalog() {
            assert!(!tool.spec.description.is_empty(), "{}", tool.spec.name);
            for field in &tool.spec.fields {
                assert!(!field.description.is_empty(), "{}.{}", tool.spec.name, field.name);
            }
        }
    }
}
