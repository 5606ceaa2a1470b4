// src/tools/wallet.rs

use ethers_core::types::{Bytes, TransactionRequest};
use ethers_signers::Signer;
use serde_json::json;
use std::sync::Arc;

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use super::units::{display_units, to_base_units};
use super::validation::ValidatedArgs;
use super::{checksum, resolve, submit, submitted, tool, ToolDef, ToolResult};
use crate::blockchain::wallet_manager::WalletState;
use crate::config::PRIVATE_KEY_ENV;
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

const SAVE_TO_ENV: &str = "Also store the private key in the server's PRIVATE_KEY environment variable for the rest of the process lifetime.";

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new(
                "generateWallet",
                "Create a new random wallet and make it the active signer. Returns the address, private key and mnemonic.",
            )
            .optional("saveToEnv", FieldKind::Bool, SAVE_TO_ENV),
            generate_wallet
        ),
        tool!(
            ToolSpec::new("loadWallet", "Make the wallet for a private key the active signer.")
                .required("privateKey", FieldKind::Text, "Hex private key, 64 characters, optionally 0x-prefixed.")
                .optional("saveToEnv", FieldKind::Bool, SAVE_TO_ENV),
            load_wallet
        ),
        tool!(
            ToolSpec::new(
                "loadWalletFromMnemonic",
                "Make the first account (m/44'/60'/0'/0/0) of a BIP-39 mnemonic the active signer.",
            )
            .required("mnemonic", FieldKind::Text, "BIP-39 English mnemonic phrase.")
            .optional("saveToEnv", FieldKind::Bool, SAVE_TO_ENV),
            load_wallet_from_mnemonic
        ),
        tool!(
            ToolSpec::new("checkWalletExists", "Report whether a wallet is active and its address."),
            check_wallet_exists
        ),
        tool!(
            ToolSpec::new("signMessage", "Sign a message (EIP-191 personal_sign) with the active wallet.")
                .required("message", FieldKind::Text, "Message to sign."),
            sign_message
        ),
        tool!(
            ToolSpec::new("sendTransaction", "Send native currency (and optional calldata) from the active wallet.")
                .required("to", FieldKind::Address, "Recipient address.")
                .required("value", FieldKind::Amount, "Amount of native currency in ether units, e.g. \"0.01\".")
                .optional("data", FieldKind::Text, "Optional 0x-prefixed hex calldata.")
                .network(),
            send_transaction
        ),
    ]
}

async fn maybe_persist(state: &AppState, args: &ValidatedArgs, wallet: Arc<WalletState>) -> Arc<WalletState> {
    if args.flag("saveToEnv") {
        state.wallets.persist(&wallet).await
    } else {
        wallet
    }
}

fn persistence_note(wallet: &WalletState) -> String {
    if wallet.persisted {
        format!("Private key saved to {} for this process.", PRIVATE_KEY_ENV)
    } else {
        "Private key kept in memory only.".to_string()
    }
}

async fn generate_wallet(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.generate().await?;
    let wallet = maybe_persist(state, &args, wallet).await;
    Ok(ToolResponse::json(&json!({
        "address": checksum(wallet.address),
        "privateKey": wallet.private_key(),
        "mnemonic": wallet.mnemonic(),
        "persisted": wallet.persisted,
        "note": format!(
            "Store the private key and mnemonic securely; they are not shown again. {}",
            persistence_note(&wallet)
        ),
    })))
}

async fn load_wallet(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.load(args.text("privateKey")?).await?;
    let wallet = maybe_persist(state, &args, wallet).await;
    Ok(ToolResponse::text(format!(
        "Wallet {} is now active. {}",
        checksum(wallet.address),
        persistence_note(&wallet)
    )))
}

async fn load_wallet_from_mnemonic(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.load_mnemonic(args.text("mnemonic")?).await?;
    let wallet = maybe_persist(state, &args, wallet).await;
    Ok(ToolResponse::text(format!(
        "Wallet {} derived from mnemonic is now active. {}",
        checksum(wallet.address),
        persistence_note(&wallet)
    )))
}

async fn check_wallet_exists(state: &AppState, _args: ValidatedArgs) -> ToolResult {
    Ok(match state.wallets.active().await {
        Some(wallet) => ToolResponse::json(&json!({
            "exists": true,
            "address": checksum(wallet.address),
            "persisted": wallet.persisted,
        })),
        None => ToolResponse::json(&json!({
            "exists": false,
            "hint": "Call generateWallet, loadWallet or loadWalletFromMnemonic to create one.",
        })),
    })
}

async fn sign_message(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let message = args.text("message")?;
    let signature = wallet
        .signer()
        .sign_message(message)
        .await
        .map_err(|e| ToolError::Chain(format!("signing failed: {}", e)))?;
    Ok(ToolResponse::json(&json!({
        "address": checksum(wallet.address),
        "message": message,
        "signature": format!("0x{}", hex::encode(signature.to_vec())),
    })))
}

fn parse_calldata(raw: Option<&str>) -> Result<Option<Bytes>, ToolError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    let hex_part = raw
        .strip_prefix("0x")
        .ok_or_else(|| ToolError::invalid("data", "hex", "calldata must be 0x-prefixed hex"))?;
    hex::decode(hex_part)
        .map(|bytes| Some(Bytes::from(bytes)))
        .map_err(|e| ToolError::invalid("data", "hex", format!("invalid calldata: {}", e)))
}

async fn send_transaction(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let to = args.address("to")?;
    let value_text = args.amount("value")?;
    let value = to_base_units("value", value_text, 18)?;
    let data = parse_calldata(args.opt_text("data"))?;

    let provider = resolve(state, &args).await?;
    let balance = provider.client.balance(wallet.address, None).await?;
    if balance < value {
        return Err(ToolError::Chain(format!(
            "insufficient balance: {} holds {} {} but the transaction sends {} {}",
            checksum(wallet.address),
            display_units(balance, 18)?,
            provider.currency_symbol,
            value_text,
            provider.currency_symbol
        )));
    }

    let mut request = TransactionRequest::new().to(to).value(value);
    if let Some(data) = data {
        request = request.data(data);
    }
    let hash = submit(&provider, &wallet, request.into()).await?;
    Ok(submitted(
        state,
        &provider,
        hash,
        format!(
            "Sent {} {} from {} to {}",
            value_text,
            provider.currency_symbol,
            checksum(wallet.address),
            checksum(to)
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_calldata() {
        assert_eq!(parse_calldata(None).unwrap(), None);
        assert_eq!(
            parse_calldata(Some("0xdeadbeef")).unwrap(),
            Some(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]))
        );
        assert!(parse_calldata(Some("deadbeef")).is_err());
        assert!(parse_calldata(Some("0xzz")).is_err());
    }
}
