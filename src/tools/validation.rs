// src/tools/validation.rs

use ethers_core::abi::{parse_abi, Abi};
use ethers_core::types::{Address, BlockId, BlockNumber, H256, U256};
use ethers_core::utils::to_checksum;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use crate::blockchain::contracts::parse_uint;
use crate::blockchain::provider::ProviderSpecifier;

/// One violated constraint on one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub constraint: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.constraint, self.message)
    }
}

/// A parsed argument value.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Address(Address),
    /// Normalized decimal string, e.g. `"1.5"`.
    Amount(String),
    Integer(u64),
    Uint(U256),
    Block(BlockId),
    Hash(H256),
    Text(String),
    Bool(bool),
    List(Vec<Value>),
    Abi(Abi),
}

type Violation = (&'static str, String);

fn parse_address(raw: &str) -> Result<Address, Violation> {
    let s = raw.trim();
    let shape_ok = s.len() == 42
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !shape_ok {
        return Err((
            "address",
            format!("must be a 0x-prefixed 40-character hex address, got '{}'", raw),
        ));
    }
    let address = Address::from_str(s).map_err(|e| ("address", e.to_string()))?;

    let digits = &s[2..];
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        let expected = to_checksum(&address, None);
        if expected != s {
            return Err((
                "checksum",
                format!("'{}' has invalid EIP-55 checksum (expected {})", s, expected),
            ));
        }
    }
    Ok(address)
}

fn parse_amount(value: &Value) -> Result<String, Violation> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(("amount", "must be a decimal string or number".to_string())),
    };
    if text.starts_with('-') {
        return Err(("non-negative", format!("must not be negative, got '{}'", text)));
    }
    let mut parts = text.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let well_formed = digits_only(whole)
        && fraction.map_or(true, digits_only)
        && !(whole.is_empty() && fraction.map_or(true, str::is_empty));
    if !well_formed {
        return Err(("amount", format!("'{}' is not a decimal number", text)));
    }
    let whole = if whole.is_empty() { "0" } else { whole };
    Ok(match fraction {
        Some(f) if !f.is_empty() => format!("{}.{}", whole, f),
        _ => whole.to_string(),
    })
}

fn parse_integer(value: &Value) -> Result<u64, Violation> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ("integer", format!("must be a non-negative integer, got {}", value)))
}

fn parse_block(value: &Value) -> Result<BlockId, Violation> {
    if let Value::Number(n) = value {
        return n
            .as_u64()
            .map(|n| BlockId::Number(BlockNumber::Number(n.into())))
            .ok_or_else(|| ("block tag", format!("invalid block number {}", n)));
    }
    let s = value
        .as_str()
        .map(|s| s.trim().to_lowercase())
        .ok_or_else(|| ("block tag", "must be a block number, hash or tag".to_string()))?;
    let tag = match s.as_str() {
        "latest" => Some(BlockNumber::Latest),
        "earliest" => Some(BlockNumber::Earliest),
        "pending" => Some(BlockNumber::Pending),
        "safe" => Some(BlockNumber::Safe),
        "finalized" => Some(BlockNumber::Finalized),
        _ => None,
    };
    if let Some(tag) = tag {
        return Ok(BlockId::Number(tag));
    }
    if s.len() == 66 && s.starts_with("0x") {
        return H256::from_str(&s)
            .map(BlockId::Hash)
            .map_err(|e| ("block tag", e.to_string()));
    }
    let number = match s.strip_prefix("0x") {
        Some(hex_part) => u64::from_str_radix(hex_part, 16).ok(),
        None => s.parse::<u64>().ok(),
    };
    number
        .map(|n| BlockId::Number(BlockNumber::Number(n.into())))
        .ok_or_else(|| {
            (
                "block tag",
                format!(
                    "'{}' is not latest/earliest/pending/safe/finalized, a block number or a block hash",
                    s
                ),
            )
        })
}

fn parse_hash(raw: &str) -> Result<H256, Violation> {
    let s = raw.trim();
    if s.len() != 66 || !s.starts_with("0x") || !s[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(("hash", format!("must be a 0x-prefixed 64-character hex hash, got '{}'", raw)));
    }
    H256::from_str(s).map_err(|e| ("hash", e.to_string()))
}

fn parse_abi_value(value: &Value) -> Result<Abi, Violation> {
    let parsed = match value {
        Value::String(s) => {
            let s = s.trim();
            match serde_json::from_str::<Value>(s) {
                Ok(inner @ Value::Array(_)) => return parse_abi_value(&inner),
                _ => serde_json::from_str::<Abi>(s).map_err(|e| e.to_string()),
            }
        }
        // Human-readable fragments: ["function balanceOf(address) view returns (uint256)"]
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
            let fragments: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            parse_abi(&fragments).map_err(|e| e.to_string())
        }
        Value::Array(_) => serde_json::from_value::<Abi>(value.clone()).map_err(|e| e.to_string()),
        _ => Err("must be a JSON ABI array or a string containing one".to_string()),
    };
    parsed.map_err(|reason| ("abi", format!("invalid ABI: {}", reason)))
}

fn parse_value(kind: FieldKind, value: &Value) -> Result<ArgValue, Violation> {
    let as_str = || {
        value
            .as_str()
            .ok_or_else(|| (kind.constraint(), format!("must be a string, got {}", value)))
    };
    match kind {
        FieldKind::Address => parse_address(as_str()?).map(ArgValue::Address),
        FieldKind::Amount => parse_amount(value).map(ArgValue::Amount),
        FieldKind::Integer => parse_integer(value).map(ArgValue::Integer),
        FieldKind::Uint => parse_uint(value)
            .map(ArgValue::Uint)
            .ok_or_else(|| ("uint256", format!("must be a non-negative integer, got {}", value))),
        FieldKind::BlockTag => parse_block(value).map(ArgValue::Block),
        FieldKind::Hash => parse_hash(as_str()?).map(ArgValue::Hash),
        FieldKind::Text => {
            let s = as_str()?;
            if s.trim().is_empty() {
                return Err(("non-empty string", "must not be empty".to_string()));
            }
            Ok(ArgValue::Text(s.to_string()))
        }
        FieldKind::Bool => match value {
            Value::Bool(b) => Ok(ArgValue::Bool(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(ArgValue::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(ArgValue::Bool(false)),
            _ => Err(("boolean", format!("must be true or false, got {}", value))),
        },
        FieldKind::List => value
            .as_array()
            .cloned()
            .map(ArgValue::List)
            .ok_or_else(|| ("array", format!("must be a JSON array, got {}", value))),
        FieldKind::Abi => parse_abi_value(value).map(ArgValue::Abi),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Checks `raw` against `spec`, collecting every violation before returning.
pub fn validate(spec: &ToolSpec, raw: &Value) -> Result<ValidatedArgs, Vec<ValidationError>> {
    let empty = Map::new();
    let object = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(vec![ValidationError::new(
                "arguments",
                "object",
                format!("arguments must be a JSON object, got {}", other),
            )])
        }
    };

    let mut values = HashMap::new();
    let mut errors = Vec::new();
    for field in &spec.fields {
        let supplied = object.get(field.name);
        match supplied {
            // Blank optional fields count as absent; clients often send "".
            Some(value) if !(is_blank(value) && !field.required) => {
                if is_blank(value) {
                    errors.push(ValidationError::new(
                        field.name,
                        "required",
                        format!("must not be empty: {}", field.description),
                    ));
                    continue;
                }
                match parse_value(field.kind, value) {
                    Ok(parsed) => {
                        values.insert(field.name, parsed);
                    }
                    Err((constraint, message)) => {
                        errors.push(ValidationError::new(field.name, constraint, message))
                    }
                }
            }
            _ if field.required => errors.push(ValidationError::new(
                field.name,
                "required",
                format!("is required: {}", field.description),
            )),
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(ValidatedArgs { values })
    } else {
        Err(errors)
    }
}

/// Arguments that passed validation, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct ValidatedArgs {
    values: HashMap<&'static str, ArgValue>,
}

fn missing(field: &str) -> ToolError {
    ToolError::invalid(field, "required", "is required")
}

impl ValidatedArgs {
    fn get(&self, field: &str) -> Result<&ArgValue, ToolError> {
        self.values.get(field).ok_or_else(|| missing(field))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn address(&self, field: &str) -> Result<Address, ToolError> {
        match self.get(field)? {
            ArgValue::Address(a) => Ok(*a),
            _ => Err(missing(field)),
        }
    }

    pub fn amount(&self, field: &str) -> Result<&str, ToolError> {
        match self.get(field)? {
            ArgValue::Amount(a) => Ok(a.as_str()),
            _ => Err(missing(field)),
        }
    }

    pub fn opt_amount(&self, field: &str) -> Option<&str> {
        self.amount(field).ok()
    }

    pub fn integer(&self, field: &str) -> Result<u64, ToolError> {
        match self.get(field)? {
            ArgValue::Integer(n) => Ok(*n),
            _ => Err(missing(field)),
        }
    }

    pub fn uint(&self, field: &str) -> Result<U256, ToolError> {
        match self.get(field)? {
            ArgValue::Uint(n) => Ok(*n),
            _ => Err(missing(field)),
        }
    }

    pub fn block(&self, field: &str) -> Result<BlockId, ToolError> {
        match self.get(field)? {
            ArgValue::Block(b) => Ok(*b),
            _ => Err(missing(field)),
        }
    }

    pub fn opt_block(&self, field: &str) -> Option<BlockId> {
        self.block(field).ok()
    }

    pub fn hash(&self, field: &str) -> Result<H256, ToolError> {
        match self.get(field)? {
            ArgValue::Hash(h) => Ok(*h),
            _ => Err(missing(field)),
        }
    }

    pub fn text(&self, field: &str) -> Result<&str, ToolError> {
        match self.get(field)? {
            ArgValue::Text(s) => Ok(s.as_str()),
            _ => Err(missing(field)),
        }
    }

    pub fn opt_text(&self, field: &str) -> Option<&str> {
        self.text(field).ok()
    }

    /// Boolean flag; absent means false.
    pub fn flag(&self, field: &str) -> bool {
        matches!(self.values.get(field), Some(ArgValue::Bool(true)))
    }

    pub fn bool(&self, field: &str) -> Result<bool, ToolError> {
        match self.get(field)? {
            ArgValue::Bool(b) => Ok(*b),
            _ => Err(missing(field)),
        }
    }

    /// List argument; absent means empty.
    pub fn list(&self, field: &str) -> &[Value] {
        match self.values.get(field) {
            Some(ArgValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn abi(&self, field: &str) -> Result<&Abi, ToolError> {
        match self.get(field)? {
            ArgValue::Abi(abi) => Ok(abi),
            _ => Err(missing(field)),
        }
    }

    /// The `provider`/`chainId` pair every chain-bound tool accepts.
    pub fn provider(&self) -> ProviderSpecifier {
        ProviderSpecifier {
            network: self.opt_text("provider").map(|s| s.trim().to_string()),
            chain_id: self.integer("chainId").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    fn transfer_spec() -> ToolSpec {
        ToolSpec::new("transferERC20", "test")
            .required("tokenAddress", FieldKind::Address, "Token contract.")
            .required("recipientAddress", FieldKind::Address, "Recipient.")
            .required("amount", FieldKind::Amount, "Amount in token units.")
            .network()
    }

    #[test]
    fn test_valid_arguments_parse() {
        let args = validate(
            &transfer_spec(),
            &json!({
                "tokenAddress": VITALIK,
                "recipientAddress": VITALIK.to_lowercase(),
                "amount": ".5",
                "provider": "Sepolia",
                "chainId": 11155111
            }),
        )
        .unwrap();
        assert_eq!(args.address("tokenAddress").unwrap(), VITALIK.parse::<Address>().unwrap());
        assert_eq!(args.amount("amount").unwrap(), "0.5");
        assert_eq!(
            args.provider(),
            ProviderSpecifier {
                network: Some("Sepolia".into()),
                chain_id: Some(11155111)
            }
        );
    }

    #[test]
    fn test_every_violation_is_reported() {
        let errors = validate(
            &transfer_spec(),
            &json!({"tokenAddress": "0x1234", "amount": "-3"}),
        )
        .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["tokenAddress", "recipientAddress", "amount"]);
        assert_eq!(errors[0].constraint, "address");
        assert_eq!(errors[1].constraint, "required");
        assert_eq!(errors[2].constraint, "non-negative");
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let broken = VITALIK.replace("dA6", "Da6");
        let err = parse_address(&broken).unwrap_err();
        assert_eq!(err.0, "checksum");
        assert!(err.1.contains(VITALIK));
        // Single-case input carries no checksum.
        assert!(parse_address(&VITALIK.to_uppercase().replacen("0X", "0x", 1)).is_ok());
    }

    #[test]
    fn test_amount_forms() {
        assert_eq!(parse_amount(&json!("1.25")).unwrap(), "1.25");
        assert_eq!(parse_amount(&json!(3)).unwrap(), "3");
        assert_eq!(parse_amount(&json!("10.")).unwrap(), "10");
        assert_eq!(parse_amount(&json!(-1)).unwrap_err().0, "non-negative");
        for bad in ["", ".", "1e18", "1.2.3", "abc", "0x10"] {
            assert_eq!(parse_amount(&json!(bad)).unwrap_err().0, "amount", "{bad}");
        }
    }

    #[test]
    fn test_block_tags() {
        assert_eq!(parse_block(&json!("latest")).unwrap(), BlockId::Number(BlockNumber::Latest));
        assert_eq!(
            parse_block(&json!("0x10")).unwrap(),
            BlockId::Number(BlockNumber::Number(16u64.into()))
        );
        assert_eq!(
            parse_block(&json!(42)).unwrap(),
            BlockId::Number(BlockNumber::Number(42u64.into()))
        );
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(matches!(parse_block(&json!(hash)).unwrap(), BlockId::Hash(_)));
        assert!(parse_block(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_blank_optional_fields_are_ignored() {
        let args = validate(
            &transfer_spec(),
            &json!({
                "tokenAddress": VITALIK,
                "recipientAddress": VITALIK,
                "amount": "1",
                "provider": ""
            }),
        )
        .unwrap();
        assert_eq!(args.provider(), ProviderSpecifier::default());
    }

    #[test]
    fn test_abi_accepts_json_string_and_human_readable() {
        let json_abi = json!(r#"[{"type":"function","name":"totalSupply","inputs":[],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"}]"#);
        let abi = parse_abi_value(&json_abi).unwrap();
        assert!(abi.function("totalSupply").is_ok());

        let human = json!(["function balanceOf(address owner) view returns (uint256)"]);
        let abi = parse_abi_value(&human).unwrap();
        assert_eq!(abi.function("balanceOf").unwrap().inputs.len(), 1);

        assert_eq!(parse_abi_value(&json!(7)).unwrap_err().0, "abi");
    }

    #[test]
    fn test_non_object_arguments() {
        let errors = validate(&transfer_spec(), &json!([1, 2])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "arguments");
    }
}
