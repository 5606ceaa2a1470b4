// src/tools/tokens.rs

use ethers_core::types::{Address, U256};
use serde_json::json;

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use super::units::{display_units, to_base_units};
use super::validation::ValidatedArgs;
use super::{checksum, resolve, submit, submitted, tool, ToolDef, ToolResult};
use crate::blockchain::client::ChainClient;
use crate::blockchain::contracts::{self, ContractError};
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new("getERC20TokenInfo", "Get name, symbol, decimals and total supply of an ERC20 token.")
                .required("tokenAddress", FieldKind::Address, "ERC20 token contract address.")
                .network(),
            get_token_info
        ),
        tool!(
            ToolSpec::new("getERC20Balance", "Get the ERC20 token balance of an address.")
                .required("tokenAddress", FieldKind::Address, "ERC20 token contract address.")
                .required("ownerAddress", FieldKind::Address, "Address whose balance to fetch.")
                .network(),
            get_balance
        ),
        tool!(
            ToolSpec::new("getERC20Allowance", "Get how many tokens a spender may transfer on behalf of an owner.")
                .required("tokenAddress", FieldKind::Address, "ERC20 token contract address.")
                .required("ownerAddress", FieldKind::Address, "Token owner.")
                .required("spenderAddress", FieldKind::Address, "Approved spender.")
                .network(),
            get_allowance
        ),
        tool!(
            ToolSpec::new("transferERC20", "Transfer ERC20 tokens from the active wallet.")
                .required("tokenAddress", FieldKind::Address, "ERC20 token contract address.")
                .required("recipientAddress", FieldKind::Address, "Recipient address.")
                .required("amount", FieldKind::Amount, "Amount in token units (not base units), e.g. \"12.5\".")
                .network(),
            transfer
        ),
        tool!(
            ToolSpec::new("approveERC20", "Approve a spender to transfer ERC20 tokens from the active wallet.")
                .required("tokenAddress", FieldKind::Address, "ERC20 token contract address.")
                .required("spenderAddress", FieldKind::Address, "Address allowed to spend.")
                .required("amount", FieldKind::Amount, "Allowance in token units, e.g. \"100\".")
                .network(),
            approve
        ),
    ]
}

// Decimals and a display symbol for amounts of `token`.
async fn token_units(client: &dyn ChainClient, token: Address) -> Result<(u32, String), ToolError> {
    let info = contracts::erc20_info(client, token).await?;
    let decimals = info.decimals.ok_or_else(|| ContractError::Decode {
        what: "decimals".to_string(),
        contract: token,
    })?;
    Ok((
        decimals as u32,
        info.symbol.unwrap_or_else(|| "tokens".to_string()),
    ))
}

async fn get_token_info(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let token = args.address("tokenAddress")?;
    let provider = resolve(state, &args).await?;
    let info = contracts::erc20_info(provider.client.as_ref(), token).await?;
    let total_supply_formatted = match (info.total_supply, info.decimals) {
        (Some(supply), Some(decimals)) => Some(display_units(supply, decimals as u32)?),
        _ => None,
    };
    Ok(ToolResponse::json(&json!({
        "address": checksum(token),
        "network": provider.label(),
        "name": info.name,
        "symbol": info.symbol,
        "decimals": info.decimals,
        "totalSupply": info.total_supply.map(|s| s.to_string()),
        "totalSupplyFormatted": total_supply_formatted,
    })))
}

async fn get_balance(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let token = args.address("tokenAddress")?;
    let owner = args.address("ownerAddress")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    let (decimals, symbol) = token_units(client, token).await?;
    let balance = contracts::erc20_balance_of(client, token, owner).await?;
    Ok(ToolResponse::text(format!(
        "Balance of {}: {} {} ({} base units) on {}",
        checksum(owner),
        display_units(balance, decimals)?,
        symbol,
        balance,
        provider.label()
    )))
}

async fn get_allowance(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let token = args.address("tokenAddress")?;
    let owner = args.address("ownerAddress")?;
    let spender = args.address("spenderAddress")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    let (decimals, symbol) = token_units(client, token).await?;
    let allowance = contracts::erc20_allowance(client, token, owner, spender).await?;
    Ok(ToolResponse::text(format!(
        "Allowance of {} for spender {}: {} {} ({} base units) on {}",
        checksum(owner),
        checksum(spender),
        display_units(allowance, decimals)?,
        symbol,
        allowance,
        provider.label()
    )))
}

async fn transfer(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let token = args.address("tokenAddress")?;
    let recipient = args.address("recipientAddress")?;
    let amount_text = args.amount("amount")?;

    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    let (decimals, symbol) = token_units(client, token).await?;
    let amount = to_base_units("amount", amount_text, decimals)?;

    let balance = contracts::erc20_balance_of(client, token, wallet.address).await?;
    if balance < amount {
        return Err(ToolError::Chain(format!(
            "insufficient balance: {} holds {} {} of token {} but the transfer needs {} {}",
            checksum(wallet.address),
            display_units(balance, decimals)?,
            symbol,
            checksum(token),
            amount_text,
            symbol
        )));
    }

    let tx = contracts::call_request(token, contracts::erc20_transfer_data(recipient, amount));
    let hash = submit(&provider, &wallet, tx).await?;
    Ok(submitted(
        state,
        &provider,
        hash,
        format!("Transferred {} {} to {}", amount_text, symbol, checksum(recipient)),
    ))
}

async fn approve(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let token = args.address("tokenAddress")?;
    let spender = args.address("spenderAddress")?;
    let amount_text = args.amount("amount")?;

    let provider = resolve(state, &args).await?;
    let (decimals, symbol) = token_units(provider.client.as_ref(), token).await?;
    let amount: U256 = to_base_units("amount", amount_text, decimals)?;

    let tx = contracts::call_request(token, contracts::erc20_approve_data(spender, amount));
    let hash = submit(&provider, &wallet, tx).await?;
    Ok(submitted(
        state,
        &provider,
        hash,
        format!("Approved {} to spend {} {}", checksum(spender), amount_text, symbol),
    ))
}
