// src/tools/contract.rs

use ethers_core::types::TransactionRequest;
use serde_json::{json, Value};

use super::schema::{FieldKind, ToolSpec};
use super::units::to_base_units;
use super::validation::ValidatedArgs;
use super::{checksum, resolve, submit, submitted, tool, ToolDef, ToolResult};
use crate::blockchain::contracts::{self, ensure_contract};
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

const ABI_DOC: &str =
    "Contract ABI: a JSON ABI array (or its string form) or human-readable signatures such as [\"function balanceOf(address) view returns (uint256)\"].";

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new("contractCall", "Call a read-only contract method and decode its result.")
                .required("contractAddress", FieldKind::Address, "Contract address.")
                .required("abi", FieldKind::Abi, ABI_DOC)
                .required("method", FieldKind::Text, "Method name, or full signature for overloaded methods.")
                .optional("args", FieldKind::List, "Method arguments in ABI order.")
                .network(),
            contract_call
        ),
        tool!(
            ToolSpec::new(
                "contractSendTransaction",
                "Send a state-changing contract call signed by the active wallet.",
            )
            .required("contractAddress", FieldKind::Address, "Contract address.")
            .required("abi", FieldKind::Abi, ABI_DOC)
            .required("method", FieldKind::Text, "Method name, or full signature for overloaded methods.")
            .optional("args", FieldKind::List, "Method arguments in ABI order.")
            .optional("value", FieldKind::Amount, "Native currency to attach, in ether units.")
            .network(),
            contract_send_transaction
        ),
    ]
}

async fn contract_call(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let contract = args.address("contractAddress")?;
    let abi = args.abi("abi")?;
    let call_args = args.list("args");
    let func = contracts::find_function(abi, args.text("method")?, call_args.len())?;
    // Encode before touching the network so bad arguments fail fast.
    contracts::encode_function_call(func, call_args)?;

    let provider = resolve(state, &args).await?;
    let outputs = contracts::call_function(provider.client.as_ref(), contract, func, call_args).await?;
    let result = match outputs.as_slice() {
        [single] => contracts::token_to_json(single),
        many => Value::Array(many.iter().map(contracts::token_to_json).collect()),
    };
    Ok(ToolResponse::json(&json!({
        "contract": checksum(contract),
        "method": func.name,
        "network": provider.label(),
        "result": result,
    })))
}

async fn contract_send_transaction(state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wallet = state.wallets.require_active().await?;
    let contract = args.address("contractAddress")?;
    let abi = args.abi("abi")?;
    let call_args = args.list("args");
    let func = contracts::find_function(abi, args.text("method")?, call_args.len())?;
    let data = contracts::encode_function_call(func, call_args)?;
    let value_text = args.opt_amount("value");
    let value = value_text.map(|v| to_base_units("value", v, 18)).transpose()?;

    let provider = resolve(state, &args).await?;
    ensure_contract(provider.client.as_ref(), contract).await?;

    let mut request = TransactionRequest::new().to(contract).data(data);
    if let Some(value) = value {
        request = request.value(value);
    }
    let hash = submit(&provider, &wallet, request.into()).await?;
    let summary = match value_text {
        Some(v) => format!(
            "Called {} on {} with {} {}",
            func.name,
            checksum(contract),
            v,
            provider.currency_symbol
        ),
        None => format!("Called {} on {}", func.name, checksum(contract)),
    };
    Ok(submitted(state, &provider, hash, summary))
}
