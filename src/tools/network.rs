// src/tools/network.rs

use ethers_core::types::{Address, BlockId, BlockNumber, U256};
use serde::Serialize;
use serde_json::{json, Value};

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use super::units::display_units;
use super::validation::ValidatedArgs;
use super::{checksum, resolve, tool, ToolDef, ToolResult};
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new(
                "getSupportedNetworks",
                "List the networks this server knows by name, with chain IDs and native currencies.",
            ),
            get_supported_networks
        ),
        tool!(
            ToolSpec::new("getBlockNumber", "Get the latest block number.").network(),
            get_block_number
        ),
        tool!(
            ToolSpec::new("getGasPrice", "Get the current gas price in gwei and wei.").network(),
            get_gas_price
        ),
        tool!(
            ToolSpec::new(
                "getFeeData",
                "Get gas price and EIP-1559 fee suggestions (maxFeePerGas, maxPriorityFeePerGas).",
            )
            .network(),
            get_fee_data
        ),
        tool!(
            ToolSpec::new("getWalletBalance", "Get the native currency balance of an address.")
                .required("address", FieldKind::Address, "Address whose balance to fetch.")
                .optional("blockTag", FieldKind::BlockTag, "Block number, hash or tag. Defaults to latest.")
                .network(),
            get_wallet_balance
        ),
        tool!(
            ToolSpec::new("getTransactionCount", "Get the number of transactions sent from an address (its nonce).")
                .required("address", FieldKind::Address, "Address whose nonce to fetch.")
                .optional("blockTag", FieldKind::BlockTag, "Block number, hash or tag. Defaults to latest.")
                .network(),
            get_transaction_count
        ),
        tool!(
            ToolSpec::new("getBlockDetails", "Get a block by number, hash or tag.")
                .required("blockTag", FieldKind::BlockTag, "Block number, hash, or one of latest/earliest/pending/safe/finalized.")
                .network(),
            get_block_details
        ),
        tool!(
            ToolSpec::new("getTransactionDetails", "Get a transaction by hash.")
                .required("txHash", FieldKind::Hash, "Transaction hash.")
                .network(),
            get_transaction_details
        ),
        tool!(
            ToolSpec::new("getTransactionReceipt", "Get the receipt of a mined transaction.")
                .required("txHash", FieldKind::Hash, "Transaction hash.")
                .network(),
            get_transaction_receipt
        ),
        tool!(
            ToolSpec::new("getCode", "Get the bytecode deployed at an address.")
                .required("address", FieldKind::Address, "Contract address.")
                .network(),
            get_code
        ),
        tool!(
            ToolSpec::new("resolveName", "Resolve an ENS name to an address.")
                .required("name", FieldKind::Text, "ENS name, e.g. vitalik.eth.")
                .network(),
            resolve_name
        ),
        tool!(
            ToolSpec::new("lookupAddress", "Reverse-resolve an address to its primary ENS name.")
                .required("address", FieldKind::Address, "Address to look up.")
                .network(),
            lookup_address
        ),
    ]
}

fn block_label(block: &BlockId) -> String {
    match block {
        BlockId::Hash(hash) => format!("{:?}", hash),
        BlockId::Number(BlockNumber::Number(n)) => n.to_string(),
        BlockId::Number(tag) => format!("{:?}", tag).to_lowercase(),
    }
}

fn to_json<T: Serialize>(what: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Chain(format!("could not encode {}: {}", what, e)))
}

async fn get_supported_networks(state: &AppState, _args: ValidatedArgs) -> ToolResult {
    let networks: Vec<Value> = state
        .registry
        .list()
        .iter()
        .map(|n| {
            json!({
                "name": n.name,
                "chainId": n.chain_id,
                "nativeCurrencySymbol": n.native_currency_symbol,
                "explorerUrl": n.explorer_url,
            })
        })
        .collect();
    Ok(ToolResponse::json(&json!({
        "defaultNetwork": state.config.default_network,
        "networks": networks,
    })))
}

async fn get_block_number(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let provider = resolve(state, &args).await?;
    let number = provider.client.block_number().await?;
    Ok(ToolResponse::text(format!(
        "Current block number on {}: {}",
        provider.label(),
        number
    )))
}

async fn get_gas_price(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let provider = resolve(state, &args).await?;
    let price = provider.client.gas_price().await?;
    Ok(ToolResponse::text(format!(
        "Gas price on {}: {} gwei ({} wei)",
        provider.label(),
        display_units(price, 9)?,
        price
    )))
}

async fn get_fee_data(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let provider = resolve(state, &args).await?;
    let fees = provider.client.fee_data().await?;
    let gwei = |v: Option<U256>| -> Result<Value, ToolError> {
        Ok(match v {
            Some(wei) => json!({"wei": wei.to_string(), "gwei": display_units(wei, 9)?}),
            None => Value::Null,
        })
    };
    Ok(ToolResponse::json(&json!({
        "network": provider.label(),
        "chainId": provider.chain_id,
        "gasPrice": gwei(Some(fees.gas_price))?,
        "maxFeePerGas": gwei(fees.max_fee_per_gas)?,
        "maxPriorityFeePerGas": gwei(fees.max_priority_fee_per_gas)?,
    })))
}

async fn get_wallet_balance(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let address = args.address("address")?;
    let block = args.opt_block("blockTag");
    let provider = resolve(state, &args).await?;
    let wei = provider.client.balance(address, block).await?;
    Ok(ToolResponse::text(format!(
        "Balance of {}: {} {} ({} wei) on {}",
        checksum(address),
        display_units(wei, 18)?,
        provider.currency_symbol,
        wei,
        provider.label()
    )))
}

async fn get_transaction_count(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let address = args.address("address")?;
    let block = args.opt_block("blockTag");
    let provider = resolve(state, &args).await?;
    let count = provider.client.transaction_count(address, block).await?;
    Ok(ToolResponse::text(format!(
        "Transaction count of {} on {}: {}",
        checksum(address),
        provider.label(),
        count
    )))
}

async fn get_block_details(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let block_id = args.block("blockTag")?;
    let provider = resolve(state, &args).await?;
    let block = provider.client.block(block_id).await?.ok_or_else(|| {
        ToolError::Chain(format!(
            "block {} not found on {}",
            block_label(&block_id),
            provider.label()
        ))
    })?;
    Ok(ToolResponse::json(&to_json("block", &block)?))
}

async fn get_transaction_details(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let hash = args.hash("txHash")?;
    let provider = resolve(state, &args).await?;
    let tx = provider.client.transaction(hash).await?.ok_or_else(|| {
        ToolError::Chain(format!("transaction {:?} not found on {}", hash, provider.label()))
    })?;
    Ok(ToolResponse::json(&to_json("transaction", &tx)?))
}

async fn get_transaction_receipt(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let hash = args.hash("txHash")?;
    let provider = resolve(state, &args).await?;
    let receipt = provider.client.transaction_receipt(hash).await?.ok_or_else(|| {
        ToolError::Chain(format!(
            "no receipt for transaction {:?} on {}; it may be pending or unknown",
            hash,
            provider.label()
        ))
    })?;
    Ok(ToolResponse::json(&to_json("receipt", &receipt)?))
}

async fn get_code(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let address = args.address("address")?;
    let provider = resolve(state, &args).await?;
    let code = provider.client.code(address).await?;
    Ok(ToolResponse::json(&json!({
        "address": checksum(address),
        "network": provider.label(),
        "isContract": !code.as_ref().is_empty(),
        "sizeBytes": code.len(),
        "code": format!("0x{}", hex::encode(code.as_ref())),
    })))
}

async fn resolve_name(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let name = args.text("name")?.trim().to_string();
    let provider = resolve(state, &args).await?;
    let address = provider.client.resolve_name(&name).await?;
    Ok(ToolResponse::text(format!(
        "{} resolves to {} on {}",
        name,
        checksum(address),
        provider.label()
    )))
}

async fn lookup_address(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let address: Address = args.address("address")?;
    let provider = resolve(state, &args).await?;
    let name = provider.client.lookup_address(address).await?;
    Ok(ToolResponse::text(format!(
        "{} resolves to {} on {}",
        checksum(address),
        name,
        provider.label()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_unencodable_payload_is_an_error() {
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), "pair keys are not JSON object keys");
        let err = to_json("block", &bad).unwrap_err();
        assert!(matches!(err, ToolError::Chain(msg) if msg.starts_with("could not encode block")));

        let ok = to_json("block", &json!({"number": "0x1"})).unwrap();
        assert_eq!(ok["number"], "0x1");
    }

    #[test]
    fn test_block_label() {
        assert_eq!(block_label(&BlockId::Number(BlockNumber::Number(7u64.into()))), "7");
        assert_eq!(block_label(&BlockId::Number(BlockNumber::Latest)), "latest");
    }
}
