//! Declarative argument schemas.
//!
//! A [`ToolSpec`] is the single description of a tool's arguments: the
//! validator checks calls against it and `tools/list` renders it as JSON
//! Schema, so documentation and error messages never drift apart.

use serde_json::{json, Map, Value};

/// Semantic type of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 0x-prefixed 20-byte hex; mixed case must be a valid checksum.
    Address,
    /// Non-negative decimal amount, as a string or number.
    Amount,
    /// Non-negative integer that fits in 64 bits.
    Integer,
    /// Non-negative 256-bit integer (token IDs, raw wei).
    Uint,
    /// Block number, hash or tag such as `latest`.
    BlockTag,
    /// 0x-prefixed 32-byte hex.
    Hash,
    /// Non-empty string.
    Text,
    Bool,
    /// JSON array of arbitrary values.
    List,
    /// Contract ABI as a JSON array or a string holding one.
    Abi,
}

impl FieldKind {
    /// Constraint label used in validation errors.
    pub fn constraint(self) -> &'static str {
        match self {
            FieldKind::Address => "address",
            FieldKind::Amount => "amount",
            FieldKind::Integer => "integer",
            FieldKind::Uint => "uint256",
            FieldKind::BlockTag => "block tag",
            FieldKind::Hash => "hash",
            FieldKind::Text => "non-empty string",
            FieldKind::Bool => "boolean",
            FieldKind::List => "array",
            FieldKind::Abi => "abi",
        }
    }

    fn json_schema(self) -> Value {
        match self {
            FieldKind::Address => json!({"type": "string", "pattern": "^0x[0-9a-fA-F]{40}$"}),
            FieldKind::Hash => json!({"type": "string", "pattern": "^0x[0-9a-fA-F]{64}$"}),
            FieldKind::Amount | FieldKind::Uint => json!({"type": ["string", "number"]}),
            FieldKind::Integer => json!({"type": "integer", "minimum": 0}),
            FieldKind::BlockTag => json!({"type": ["string", "integer"]}),
            FieldKind::Text => json!({"type": "string", "minLength": 1}),
            FieldKind::Bool => json!({"type": "boolean"}),
            FieldKind::List => json!({"type": "array"}),
            FieldKind::Abi => json!({"type": ["string", "array"]}),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl ToolSpec {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            fields: Vec::new(),
        }
    }

    pub fn required(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: true,
            description,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        self.fields.push(FieldSpec {
            name,
            kind,
            required: false,
            description,
        });
        self
    }

    /// Adds the optional `provider` and `chainId` fields shared by every
    /// chain-bound tool.
    pub fn network(self) -> Self {
        self.optional(
            "provider",
            FieldKind::Text,
            "Network name (e.g. mainnet, sepolia, base) or an http(s)/ws(s) RPC URL. Defaults to the server's default network.",
        )
        .optional(
            "chainId",
            FieldKind::Integer,
            "Expected chain ID. Must agree with the named network or the chain behind the RPC URL.",
        )
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON Schema for the MCP `tools/list` response.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut schema = field.kind.json_schema();
            if let Value::Object(map) = &mut schema {
                map.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.to_string(), schema);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Entry for the `tools/list` result.
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_schema_lists_required_fields_and_descriptions() {
        let spec = ToolSpec::new("getWalletBalance", "Native balance of an address.")
            .required("address", FieldKind::Address, "Account to query.")
            .optional("blockTag", FieldKind::BlockTag, "Block to query at.")
            .network();

        let schema = spec.input_schema();
        assert_eq!(schema["required"], json!(["address"]));
        assert_eq!(schema["properties"]["address"]["description"], "Account to query.");
        assert_eq!(schema["properties"]["chainId"]["type"], "integer");
        assert!(schema["properties"]["provider"].is_object());
        assert_eq!(spec.describe()["name"], "getWalletBalance");
    }
}
