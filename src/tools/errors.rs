//! Error taxonomy for tool calls.
//!
//! Every failure a handler can hit is a [`ToolError`]. [`classify`] maps it to
//! an [`ErrorKind`] with an ordered table of substring patterns, and
//! [`to_envelope`] renders it into the `isError` response the caller sees.
//! Neither function logs or touches shared state.

use std::fmt;
use thiserror::Error;

use super::validation::ValidationError;
use crate::blockchain::client::ClientError;
use crate::blockchain::contracts::ContractError;
use crate::blockchain::provider::ResolutionError;
use crate::blockchain::wallet_manager::WalletError;
use crate::mcp::protocol::ToolResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    UnknownNetwork,
    ChainIdMismatch,
    ConnectionFailed,
    NoWalletError,
    UpstreamRevert,
    InsufficientBalance,
    InsufficientAllowance,
    TokenNotFound,
    Unauthorized,
    UnknownFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationFailure => "ValidationFailure",
            ErrorKind::UnknownNetwork => "UnknownNetwork",
            ErrorKind::ChainIdMismatch => "ChainIdMismatch",
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::NoWalletError => "NoWalletError",
            ErrorKind::UpstreamRevert => "UpstreamRevert",
            ErrorKind::InsufficientBalance => "InsufficientBalance",
            ErrorKind::InsufficientAllowance => "InsufficientAllowance",
            ErrorKind::TokenNotFound => "TokenNotFound",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::UnknownFailure => "UnknownFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{}", render_validation(.0))]
    Validation(Vec<ValidationError>),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Failed on-chain pre-check, phrased so the classifier recognizes it.
    #[error("{0}")]
    Chain(String),
}

impl ToolError {
    /// Single-field validation failure raised after schema validation, e.g.
    /// an amount with more decimals than the token supports.
    pub fn invalid(field: &str, constraint: &str, message: impl Into<String>) -> Self {
        ToolError::Validation(vec![ValidationError::new(field, constraint, message)])
    }
}

impl From<Vec<ValidationError>> for ToolError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ToolError::Validation(errors)
    }
}

fn render_validation(errors: &[ValidationError]) -> String {
    let mut out = format!("{} invalid argument(s):", errors.len());
    for err in errors {
        out.push_str("\n- ");
        out.push_str(&err.to_string());
    }
    out
}

/// Ordered classifier table for chain-level failures. First match wins, so
/// the specific entries sit above the generic revert patterns.
const CLASSIFIERS: &[(&[&str], ErrorKind)] = &[
    (
        &["insufficient funds", "insufficient balance", "exceeds balance"],
        ErrorKind::InsufficientBalance,
    ),
    (
        &["insufficient allowance", "exceeds allowance"],
        ErrorKind::InsufficientAllowance,
    ),
    (
        &["nonexistent token", "invalid token id", "token not found", "owner query for nonexistent"],
        ErrorKind::TokenNotFound,
    ),
    (
        &[
            "not owner",
            "not the owner",
            "caller is not owner nor approved",
            "not token owner",
            "not authorized",
            "unauthorized",
        ],
        ErrorKind::Unauthorized,
    ),
    (&["execution reverted", "revert"], ErrorKind::UpstreamRevert),
];

fn classify_text(text: &str) -> ErrorKind {
    let normalized = text.to_lowercase();
    CLASSIFIERS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| normalized.contains(p)))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::UnknownFailure)
}

/// Kind of `err`, checked in order: validation, resolution, missing wallet,
/// unreachable endpoint, then the pattern table.
pub fn classify(err: &ToolError) -> ErrorKind {
    match err {
        ToolError::Validation(_) => ErrorKind::ValidationFailure,
        ToolError::Resolution(ResolutionError::UnknownNetwork { .. }) => ErrorKind::UnknownNetwork,
        ToolError::Resolution(ResolutionError::ChainIdMismatch { .. }) => ErrorKind::ChainIdMismatch,
        ToolError::Resolution(ResolutionError::ConnectionFailed { .. }) => ErrorKind::ConnectionFailed,
        ToolError::Wallet(WalletError::NoWallet) => ErrorKind::NoWalletError,
        ToolError::Wallet(WalletError::InvalidKey(_) | WalletError::InvalidMnemonic(_)) => {
            ErrorKind::ValidationFailure
        }
        ToolError::Contract(ContractError::Abi(_)) => ErrorKind::ValidationFailure,
        ToolError::Client(ClientError::Unreachable(_))
        | ToolError::Contract(ContractError::Client(ClientError::Unreachable(_))) => {
            ErrorKind::ConnectionFailed
        }
        other => classify_text(&other.to_string()),
    }
}

/// Error envelope for `err`. The text starts with the kind and keeps the
/// original message, which names the field, network or condition.
pub fn to_envelope(err: &ToolError) -> ToolResponse {
    let kind = classify(err);
    let detail = match err {
        ToolError::Wallet(WalletError::InvalidKey(_)) => format!("privateKey: {}", err),
        ToolError::Wallet(WalletError::InvalidMnemonic(_)) => format!("mnemonic: {}", err),
        _ => err.to_string(),
    };
    ToolResponse::error(format!("{}: {}", kind, detail))
}

/// Envelope for a call naming a tool that does not exist.
pub fn unknown_tool(name: &str) -> ToolResponse {
    ToolResponse::error(format!(
        "{}: unknown tool '{}'. Use tools/list to see the available tools",
        ErrorKind::ValidationFailure,
        name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::Address;

    #[test]
    fn test_validation_lists_every_field() {
        let err = ToolError::Validation(vec![
            ValidationError::new("address", "address", "must be a 0x-prefixed 40-character hex address, got '0x12'"),
            ValidationError::new("amount", "non-negative", "must not be negative, got '-1'"),
        ]);
        let envelope = to_envelope(&err);
        assert!(envelope.is_error);
        let text = envelope.joined_text();
        assert!(text.starts_with("ValidationFailure: 2 invalid argument(s):"));
        assert!(text.contains("address (address)"));
        assert!(text.contains("amount (non-negative)"));
    }

    #[test]
    fn test_resolution_errors_keep_their_kind() {
        let unknown = ToolError::from(ResolutionError::UnknownNetwork {
            requested: "not-a-real-network".into(),
            supported: vec!["mainnet".into(), "sepolia".into()],
        });
        assert_eq!(classify(&unknown), ErrorKind::UnknownNetwork);
        let text = to_envelope(&unknown).joined_text();
        assert!(text.contains("not-a-real-network"));
        assert!(text.contains("mainnet, sepolia"));

        let mismatch = ToolError::from(ResolutionError::ChainIdMismatch {
            subject: "network 'sepolia'".into(),
            expected: 11155111,
            actual: 1,
        });
        assert_eq!(classify(&mismatch), ErrorKind::ChainIdMismatch);
    }

    #[test]
    fn test_no_wallet_message_is_instructive() {
        let text = to_envelope(&WalletError::NoWallet.into()).joined_text();
        assert!(text.starts_with("NoWalletError:"));
        assert!(text.contains("generateWallet"));
    }

    #[test]
    fn test_upstream_messages_are_pattern_matched() {
        let cases = [
            ("insufficient funds for gas * price + value", ErrorKind::InsufficientBalance),
            ("execution reverted: ERC20: transfer amount exceeds balance", ErrorKind::InsufficientBalance),
            ("execution reverted: ERC20: insufficient allowance", ErrorKind::InsufficientAllowance),
            ("execution reverted: ERC721: invalid token ID", ErrorKind::TokenNotFound),
            ("execution reverted: Ownable: caller is not the owner", ErrorKind::Unauthorized),
            ("execution reverted", ErrorKind::UpstreamRevert),
            ("nonce too low", ErrorKind::UnknownFailure),
        ];
        for (message, expected) in cases {
            let err = ToolError::Client(ClientError::Rpc(message.into()));
            assert_eq!(classify(&err), expected, "{message}");
        }
    }

    #[test]
    fn test_unclassified_text_survives_verbatim() {
        let err = ToolError::Client(ClientError::Rpc("nonce too low: next nonce 7".into()));
        assert_eq!(
            to_envelope(&err).joined_text(),
            "UnknownFailure: nonce too low: next nonce 7"
        );
    }

    #[test]
    fn test_unreachable_is_connection_failure() {
        let err = ToolError::Contract(ContractError::Client(ClientError::Unreachable(
            "request timed out after 30s".into(),
        )));
        assert_eq!(classify(&err), ErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_missing_contract_is_token_not_found() {
        let err = ToolError::Contract(ContractError::NoCode(Address::zero()));
        assert_eq!(classify(&err), ErrorKind::TokenNotFound);
    }

    #[test]
    fn test_pre_check_failures() {
        let balance = ToolError::Chain("insufficient balance: have 1 TST, need 5 TST".into());
        assert_eq!(classify(&balance), ErrorKind::InsufficientBalance);
        let owner = ToolError::Chain("not owner: token 7 is owned by 0xabc".into());
        assert_eq!(classify(&owner), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_invalid_key_names_the_field() {
        let err = ToolError::from(WalletError::InvalidKey("expected 64 hex characters".into()));
        let text = to_envelope(&err).joined_text();
        assert!(text.starts_with("ValidationFailure: privateKey: invalid private key"));
    }
}
