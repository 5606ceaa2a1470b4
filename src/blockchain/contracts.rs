// src/blockchain/contracts.rs

use ethers_core::abi::{decode, encode, Abi, Function, ParamType, Token};
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, I256, U256,
};
use ethers_core::utils::{keccak256, to_checksum};
use serde_json::{json, Value};
use std::str::FromStr;
use thiserror::Error;

use super::client::{ChainClient, ClientError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("no contract deployed at {}: token not found", to_checksum(.0, None))]
    NoCode(Address),
    #[error("could not decode {what} returned by {}", to_checksum(.contract, None))]
    Decode { what: String, contract: Address },
    #[error("{0}")]
    Abi(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

fn decode_string(bytes: &[u8]) -> Option<String> {
    if let Ok(tokens) = decode(&[ParamType::String], bytes) {
        if let Some(Token::String(s)) = tokens.first() {
            return Some(s.clone());
        }
    }
    // Older tokens (MKR and friends) return bytes32.
    if let Ok(tokens) = decode(&[ParamType::FixedBytes(32)], bytes) {
        if let Some(Token::FixedBytes(b)) = tokens.first() {
            return String::from_utf8(b.iter().copied().take_while(|c| *c != 0u8).collect()).ok();
        }
    }
    None
}

fn decode_u256(bytes: &[u8]) -> Option<U256> {
    match decode(&[ParamType::Uint(256)], bytes).ok()?.first() {
        Some(Token::Uint(n)) => Some(*n),
        _ => None,
    }
}

fn decode_address(bytes: &[u8]) -> Option<Address> {
    match decode(&[ParamType::Address], bytes).ok()?.first() {
        Some(Token::Address(a)) => Some(*a),
        _ => None,
    }
}

/// Unsigned call or transaction to `to` carrying `data`.
pub fn call_request(to: Address, data: Bytes) -> TypedTransaction {
    TransactionRequest::new().to(to).data(data).into()
}

/// Fails with [`ContractError::NoCode`] when nothing is deployed at `address`.
pub async fn ensure_contract(client: &dyn ChainClient, address: Address) -> Result<(), ContractError> {
    let code = client.code(address).await?;
    if code.as_ref().is_empty() {
        return Err(ContractError::NoCode(address));
    }
    Ok(())
}

async fn read(client: &dyn ChainClient, contract: Address, data: Bytes) -> Result<Bytes, ContractError> {
    Ok(client.call(&call_request(contract, data)).await?)
}

async fn read_u256(
    client: &dyn ChainClient,
    contract: Address,
    what: &str,
    data: Bytes,
) -> Result<U256, ContractError> {
    let raw = read(client, contract, data).await?;
    decode_u256(&raw).ok_or_else(|| ContractError::Decode {
        what: what.to_string(),
        contract,
    })
}

async fn read_string(
    client: &dyn ChainClient,
    contract: Address,
    what: &str,
    data: Bytes,
) -> Result<String, ContractError> {
    let raw = read(client, contract, data).await?;
    decode_string(&raw).ok_or_else(|| ContractError::Decode {
        what: what.to_string(),
        contract,
    })
}

// Optional getters: a revert or an undecodable answer yields None, an
// unreachable node stays an error.
fn optional<T>(result: Result<T, ContractError>) -> Result<Option<T>, ContractError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err @ ContractError::Client(ClientError::Unreachable(_))) => Err(err),
        Err(_) => Ok(None),
    }
}

async fn optional_string(
    client: &dyn ChainClient,
    contract: Address,
    sig: &str,
) -> Result<Option<String>, ContractError> {
    optional(read_string(client, contract, sig, encode_call(sig, vec![])).await)
}

async fn optional_total_supply(client: &dyn ChainClient, contract: Address) -> Result<Option<U256>, ContractError> {
    optional(read_u256(client, contract, "totalSupply", encode_call("totalSupply()", vec![])).await)
}

// ---------------------------------------------------------------------------
// ERC20

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Info {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<U256>,
}

pub async fn erc20_info(client: &dyn ChainClient, token: Address) -> Result<Erc20Info, ContractError> {
    ensure_contract(client, token).await?;
    let decimals = optional(read_u256(client, token, "decimals", encode_call("decimals()", vec![])).await)?
        .filter(|d| *d <= U256::from(u8::MAX))
        .map(|d| d.as_u32() as u8);
    Ok(Erc20Info {
        name: optional_string(client, token, "name()").await?,
        symbol: optional_string(client, token, "symbol()").await?,
        decimals,
        total_supply: optional_total_supply(client, token).await?,
    })
}

pub async fn erc20_balance_of(
    client: &dyn ChainClient,
    token: Address,
    owner: Address,
) -> Result<U256, ContractError> {
    let data = encode_call("balanceOf(address)", vec![Token::Address(owner)]);
    read_u256(client, token, "balanceOf", data).await
}

pub async fn erc20_allowance(
    client: &dyn ChainClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, ContractError> {
    let data = encode_call(
        "allowance(address,address)",
        vec![Token::Address(owner), Token::Address(spender)],
    );
    read_u256(client, token, "allowance", data).await
}

pub fn erc20_transfer_data(to: Address, amount: U256) -> Bytes {
    encode_call(
        "transfer(address,uint256)",
        vec![Token::Address(to), Token::Uint(amount)],
    )
}

pub fn erc20_approve_data(spender: Address, amount: U256) -> Bytes {
    encode_call(
        "approve(address,uint256)",
        vec![Token::Address(spender), Token::Uint(amount)],
    )
}

// ---------------------------------------------------------------------------
// ERC721

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub total_supply: Option<U256>,
}

pub async fn erc721_info(client: &dyn ChainClient, contract: Address) -> Result<NftInfo, ContractError> {
    ensure_contract(client, contract).await?;
    Ok(NftInfo {
        name: optional_string(client, contract, "name()").await?,
        symbol: optional_string(client, contract, "symbol()").await?,
        total_supply: optional_total_supply(client, contract).await?,
    })
}

pub async fn erc721_owner_of(
    client: &dyn ChainClient,
    contract: Address,
    token_id: U256,
) -> Result<Address, ContractError> {
    let raw = read(
        client,
        contract,
        encode_call("ownerOf(uint256)", vec![Token::Uint(token_id)]),
    )
    .await?;
    decode_address(&raw).ok_or_else(|| ContractError::Decode {
        what: "ownerOf".to_string(),
        contract,
    })
}

pub async fn erc721_token_uri(
    client: &dyn ChainClient,
    contract: Address,
    token_id: U256,
) -> Result<String, ContractError> {
    let data = encode_call("tokenURI(uint256)", vec![Token::Uint(token_id)]);
    read_string(client, contract, "tokenURI", data).await
}

pub async fn erc721_balance_of(
    client: &dyn ChainClient,
    contract: Address,
    owner: Address,
) -> Result<U256, ContractError> {
    let data = encode_call("balanceOf(address)", vec![Token::Address(owner)]);
    read_u256(client, contract, "balanceOf", data).await
}

pub fn erc721_transfer_data(from: Address, to: Address, token_id: U256) -> Bytes {
    encode_call(
        "safeTransferFrom(address,address,uint256)",
        vec![Token::Address(from), Token::Address(to), Token::Uint(token_id)],
    )
}

pub fn erc721_set_approval_for_all_data(operator: Address, approved: bool) -> Bytes {
    encode_call(
        "setApprovalForAll(address,bool)",
        vec![Token::Address(operator), Token::Bool(approved)],
    )
}

// ---------------------------------------------------------------------------
// ERC1155

/// Metadata URI as returned by `uri(id)`, plus the URI with the `{id}`
/// placeholder expanded to 64 lowercase hex digits.
pub async fn erc1155_uri(
    client: &dyn ChainClient,
    contract: Address,
    token_id: U256,
) -> Result<(String, String), ContractError> {
    let data = encode_call("uri(uint256)", vec![Token::Uint(token_id)]);
    let uri = read_string(client, contract, "uri", data).await?;
    let expanded = uri.replace("{id}", &format!("{:0>64}", format!("{:x}", token_id)));
    Ok((uri, expanded))
}

pub async fn erc1155_balance_of(
    client: &dyn ChainClient,
    contract: Address,
    owner: Address,
    token_id: U256,
) -> Result<U256, ContractError> {
    let data = encode_call(
        "balanceOf(address,uint256)",
        vec![Token::Address(owner), Token::Uint(token_id)],
    );
    read_u256(client, contract, "balanceOf", data).await
}

pub fn erc1155_safe_transfer_data(from: Address, to: Address, token_id: U256, amount: U256) -> Bytes {
    encode_call(
        "safeTransferFrom(address,address,uint256,uint256,bytes)",
        vec![
            Token::Address(from),
            Token::Address(to),
            Token::Uint(token_id),
            Token::Uint(amount),
            Token::Bytes(Vec::new()),
        ],
    )
}

// ---------------------------------------------------------------------------
// ABI-driven calls

/// Finds `method` in `abi`. `method` is either a bare name or a full
/// signature such as `transfer(address,uint256)`; bare names that are
/// overloaded are disambiguated by argument count.
pub fn find_function<'a>(abi: &'a Abi, method: &str, arg_count: usize) -> Result<&'a Function, ContractError> {
    let method = method.trim();
    if method.contains('(') {
        let wanted: String = method.chars().filter(|c| !c.is_whitespace()).collect();
        return abi
            .functions()
            .find(|f| function_signature(f) == wanted)
            .ok_or_else(|| ContractError::Abi(format!("method '{}' not found in ABI", method)));
    }
    let candidates = abi
        .functions_by_name(method)
        .map_err(|_| ContractError::Abi(format!("method '{}' not found in ABI", method)))?;
    match candidates.iter().find(|f| f.inputs.len() == arg_count) {
        Some(f) => Ok(f),
        None => Err(ContractError::Abi(format!(
            "method '{}' takes {} argument(s), got {}",
            method,
            candidates.first().map(|f| f.inputs.len()).unwrap_or(0),
            arg_count
        ))),
    }
}

pub fn encode_function_call(func: &Function, args: &[Value]) -> Result<Bytes, ContractError> {
    let tokens = coerce_tokens(func, args)?;
    func.encode_input(&tokens)
        .map(Bytes::from)
        .map_err(|e| ContractError::Abi(format!("could not encode arguments for '{}': {}", func.name, e)))
}

/// Performs a read-only call and decodes the outputs declared by `func`.
pub async fn call_function(
    client: &dyn ChainClient,
    contract: Address,
    func: &Function,
    args: &[Value],
) -> Result<Vec<Token>, ContractError> {
    let data = encode_function_call(func, args)?;
    let raw = read(client, contract, data).await?;
    if raw.as_ref().is_empty() && !func.outputs.is_empty() {
        ensure_contract(client, contract).await?;
    }
    func.decode_output(&raw).map_err(|_| ContractError::Decode {
        what: format!("output of '{}'", func.name),
        contract,
    })
}

fn coerce_tokens(func: &Function, args: &[Value]) -> Result<Vec<Token>, ContractError> {
    if func.inputs.len() != args.len() {
        return Err(ContractError::Abi(format!(
            "arg count mismatch for '{}': expected {}, got {}",
            func.name,
            func.inputs.len(),
            args.len()
        )));
    }
    func.inputs
        .iter()
        .zip(args)
        .map(|(param, value)| {
            coerce_token(&param.kind, value).map_err(|reason| {
                let name = if param.name.is_empty() { "<unnamed>" } else { param.name.as_str() };
                ContractError::Abi(format!("argument '{}' ({}): {}", name, param_type_to_string(&param.kind), reason))
            })
        })
        .collect()
}

/// Parses an unsigned integer from a JSON number, decimal string or
/// 0x-prefixed hex string.
pub fn parse_uint(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex_part) if !hex_part.is_empty() => U256::from_str_radix(hex_part, 16).ok(),
                Some(_) => None,
                None => U256::from_dec_str(s).ok(),
            }
        }
        _ => None,
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let hex_part = s.strip_prefix("0x").ok_or("expected 0x-prefixed hex")?;
    hex::decode(hex_part).map_err(|e| e.to_string())
}

fn coerce_token(kind: &ParamType, value: &Value) -> Result<Token, String> {
    let as_str = || value.as_str().ok_or_else(|| "expected a string".to_string());
    match kind {
        ParamType::Address => Address::from_str(as_str()?.trim())
            .map(Token::Address)
            .map_err(|e| e.to_string()),
        ParamType::Uint(_) => parse_uint(value)
            .map(Token::Uint)
            .ok_or_else(|| "expected a non-negative integer".to_string()),
        ParamType::Int(_) => {
            let parsed = match value {
                Value::Number(n) => n.as_i64().map(I256::from),
                Value::String(s) => I256::from_dec_str(s.trim()).ok(),
                _ => None,
            };
            parsed
                .map(|i| Token::Int(i.into_raw()))
                .ok_or_else(|| "expected an integer".to_string())
        }
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(Token::Bool(s == "true")),
            _ => Err("expected a boolean".to_string()),
        },
        ParamType::String => Ok(Token::String(as_str()?.to_string())),
        ParamType::Bytes => {
            let s = as_str()?;
            if s.starts_with("0x") {
                decode_hex(s).map(Token::Bytes)
            } else {
                Ok(Token::Bytes(s.as_bytes().to_vec()))
            }
        }
        ParamType::FixedBytes(size) => {
            let bytes = decode_hex(as_str()?)?;
            if bytes.len() != *size {
                return Err(format!("expected {} bytes, got {}", size, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or("expected an array")?;
            items
                .iter()
                .map(|item| coerce_token(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Array)
        }
        ParamType::FixedArray(inner, size) => {
            let items = value.as_array().ok_or("expected an array")?;
            if items.len() != *size {
                return Err(format!("expected {} elements, got {}", size, items.len()));
            }
            items
                .iter()
                .map(|item| coerce_token(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::FixedArray)
        }
        ParamType::Tuple(components) => {
            let items = value.as_array().ok_or("expected an array of tuple components")?;
            if items.len() != components.len() {
                return Err(format!(
                    "expected {} tuple components, got {}",
                    components.len(),
                    items.len()
                ));
            }
            components
                .iter()
                .zip(items)
                .map(|(k, v)| coerce_token(k, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Tuple)
        }
    }
}

/// JSON rendering of decoded outputs. Integers become decimal strings so
/// values above 2^53 survive.
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => json!(to_checksum(a, None)),
        Token::Uint(n) => json!(n.to_string()),
        Token::Int(n) => json!(I256::from_raw(*n).to_string()),
        Token::Bool(b) => json!(b),
        Token::String(s) => json!(s),
        Token::Bytes(b) | Token::FixedBytes(b) => json!(format!("0x{}", hex::encode(b))),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

fn function_signature(func: &Function) -> String {
    let types: Vec<String> = func
        .inputs
        .iter()
        .map(|p| param_type_to_string(&p.kind))
        .collect();
    format!("{}({})", func.name, types.join(","))
}

fn param_type_to_string(p: &ParamType) -> String {
    match p {
        ParamType::Address => "address".to_string(),
        ParamType::Bytes => "bytes".to_string(),
        ParamType::FixedBytes(n) => format!("bytes{}", n),
        ParamType::Int(n) => format!("int{}", n),
        ParamType::Uint(n) => format!("uint{}", n),
        ParamType::Bool => "bool".to_string(),
        ParamType::String => "string".to_string(),
        ParamType::Array(inner) => format!("{}[]", param_type_to_string(inner)),
        ParamType::FixedArray(inner, n) => format!("{}[{}]", param_type_to_string(inner), n),
        ParamType::Tuple(components) => {
            let inner: Vec<String> = components.iter().map(param_type_to_string).collect();
            format!("({})", inner.join(","))
        }
    }
}
