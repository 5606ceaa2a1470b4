// src/tools/nft.rs

use serde_json::json;

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use super::validation::ValidatedArgs;
use super::{checksum, resolve, submit, submitted, tool, ToolDef, ToolResult};
use crate::blockchain::contracts::{self, ensure_contract};
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new("getNFTInfo", "Get name, symbol and total supply of an ERC721 collection.")
                .required("contractAddress", FieldKind::Address, "ERC721 contract address.")
                .network(),
            get_nft_info
        ),
        tool!(
            ToolSpec::new("getNFTOwner", "Get the owner of an ERC721 token.")
                .required("contractAddress", FieldKind::Address, "ERC721 contract address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .network(),
            get_nft_owner
        ),
        tool!(
            ToolSpec::new("getNFTTokenURI", "Get the metadata URI of an ERC721 token.")
                .required("contractAddress", FieldKind::Address, "ERC721 contract address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .network(),
            get_nft_token_uri
        ),
        tool!(
            ToolSpec::new("getNFTBalance", "Get how many tokens of an ERC721 collection an address holds.")
                .required("contractAddress", FieldKind::Address, "ERC721 contract address.")
                .required("ownerAddress", FieldKind::Address, "Holder address.")
                .network(),
            get_nft_balance
        ),
        tool!(
            ToolSpec::new("transferNFT", "Transfer an ERC721 token owned by the active wallet.")
                .required("contractAddress", FieldKind::Address, "ERC721 contract address.")
                .required("toAddress", FieldKind::Address, "Recipient address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .network(),
            transfer_nft
        ),
        tool!(
            ToolSpec::new(
                "setNFTApprovalForAll",
                "Allow or revoke an operator managing all of the active wallet's tokens in a collection.",
            )
            .required("contractAddress", FieldKind::Address, "ERC721 or ERC1155 contract address.")
            .required("operatorAddress", FieldKind::Address, "Operator address.")
            .required("approved", FieldKind::Bool, "true to approve, false to revoke.")
            .network(),
            set_approval_for_all
        ),
        tool!(
            ToolSpec::new("getERC1155TokenURI", "Get the metadata URI of an ERC1155 token.")
                .required("contractAddress", FieldKind::Address, "ERC1155 contract address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .network(),
            get_erc1155_uri
        ),
        tool!(
            ToolSpec::new("getERC1155Balance", "Get the ERC1155 balance of an address for one token ID.")
                .required("contractAddress", FieldKind::Address, "ERC1155 contract address.")
                .required("ownerAddress", FieldKind::Address, "Holder address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .network(),
            get_erc1155_balance
        ),
        tool!(
            ToolSpec::new("safeTransferERC1155", "Transfer ERC1155 tokens from the active wallet.")
                .required("contractAddress", FieldKind::Address, "ERC1155 contract address.")
                .required("toAddress", FieldKind::Address, "Recipient address.")
                .required("tokenId", FieldKind::Uint, "Token ID.")
                .required("amount", FieldKind::Uint, "Number of tokens to transfer.")
                .network(),
            safe_transfer_erc1155
        ),
    ]
}

async fn get_nft_info(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let provider = resolve(state, &args).await?;
    let info = contracts::erc721_info(provider.client.as_ref(), contract).await?;
    Ok(ToolResponse::json(&json!({
        "address": checksum(contract),
        "network": provider.label(),
        "name": info.name,
        "symbol": info.symbol,
        "totalSupply": info.total_supply.map(|s| s.to_string()),
    })))
}

async fn get_nft_owner(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let token_id = args.uint("tokenId")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let owner = contracts::erc721_owner_of(client, contract, token_id).await?;
    Ok(ToolResponse::text(format!(
        "Owner of token {} in {}: {} on {}",
        token_id,
        checksum(contract),
        checksum(owner),
        provider.label()
    )))
}

async fn get_nft_token_uri(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let token_id = args.uint("tokenId")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let uri = contracts::erc721_token_uri(client, contract, token_id).await?;
    Ok(ToolResponse::json(&json!({
        "contract": checksum(contract),
        "tokenId": token_id.to_string(),
        "tokenURI": uri,
        "network": provider.label(),
    })))
}

async fn get_nft_balance(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let owner = args.address("ownerAddress")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let balance = contracts::erc721_balance_of(client, contract, owner).await?;
    Ok(ToolResponse::text(format!(
        "{} holds {} token(s) of {} on {}",
        checksum(owner),
        balance,
        checksum(contract),
        provider.label()
    )))
}

async fn transfer_nft(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let contract = args.address("contractAddress")?;
    let to = args.address("toAddress")?;
    let token_id = args.uint("tokenId")?;

    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let owner = contracts::erc721_owner_of(client, contract, token_id).await?;
    if owner != wallet.address {
        return Err(ToolError::Chain(format!(
            "not owner: token {} of {} belongs to {}, not the active wallet {}",
            token_id,
            checksum(contract),
            checksum(owner),
            checksum(wallet.address)
        )));
    }

    let tx = contracts::call_request(
        contract,
        contracts::erc721_transfer_data(wallet.address, to, token_id),
    );
    let hash = submit(&provider, &wallet, tx).await?;
    Ok(submitted(
        state,
        &provider,
        hash,
        format!("Transferred token {} of {} to {}", token_id, checksum(contract), checksum(to)),
    ))
}

async fn set_approval_for_all(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let contract = args.address("contractAddress")?;
    let operator = args.address("operatorAddress")?;
    let approved = args.bool("approved")?;

    let provider = resolve(state, &args).await?;
    ensure_contract(provider.client.as_ref(), contract).await?;
    let tx = contracts::call_request(
        contract,
        contracts::erc721_set_approval_for_all_data(operator, approved),
    );
    let hash = submit(&provider, &wallet, tx).await?;
    let verb = if approved { "Approved" } else { "Revoked" };
    Ok(submitted(
        state,
        &provider,
        hash,
        format!("{} operator {} for {}", verb, checksum(operator), checksum(contract)),
    ))
}

async fn get_erc1155_uri(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let token_id = args.uint("tokenId")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let (raw, expanded) = contracts::erc1155_uri(client, contract, token_id).await?;
    Ok(ToolResponse::json(&json!({
        "contract": checksum(contract),
        "tokenId": token_id.to_string(),
        "uri": raw,
        "resolvedUri": expanded,
        "network": provider.label(),
    })))
}

async fn get_erc1155_balance(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let owner = args.address("ownerAddress")?;
    let token_id = args.uint("tokenId")?;
    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let balance = contracts::erc1155_balance_of(client, contract, owner, token_id).await?;
    Ok(ToolResponse::text(format!(
        "{} holds {} of token {} in {} on {}",
        checksum(owner),
        balance,
        token_id,
        checksum(contract),
        provider.label()
    )))
}

async fn safe_transfer_erc1155(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let contract = args.address("contractAddress")?;
    let to = args.address("toAddress")?;
    let token_id = args.uint("tokenId")?;
    let amount = args.uint("amount")?;

    let provider = resolve(state, &args).await?;
    let client = provider.client.as_ref();
    ensure_contract(client, contract).await?;
    let balance = contracts::erc1155_balance_of(client, contract, wallet.address, token_id).await?;
    if balance < amount {
        return Err(ToolError::Chain(format!(
            "insufficient balance: {} holds {} of token {} in {} but the transfer needs {}",
            checksum(wallet.address),
            balance,
            token_id,
            checksum(contract),
            amount
        )));
    }

    let tx = contracts::call_request(
        contract,
        contracts::erc1155_safe_transfer_data(wallet.address, to, token_id, amount),
    );
    let hash = submit(&provider, &wallet, tx).await?;
    Ok(submitted(
        state,
        &provider,
        hash,
        format!("Transferred {} of token {} in {} to {}", amount, token_id, checksum(contract), checksum(to)),
    ))
}
