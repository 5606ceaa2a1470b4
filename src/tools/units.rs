// src/tools/units.rs

use ethers_core::types::U256;
use ethers_core::utils::{format_units, parse_units, Units};

use super::errors::ToolError;
use super::schema::{FieldKind, ToolSpec};
use super::validation::ValidatedArgs;
use super::{tool, ToolDef, ToolResult};
use crate::mcp::protocol::ToolResponse;
use crate::AppState;

pub fn tools() -> Vec<ToolDef> {
    vec![
        tool!(
            ToolSpec::new("formatEther", "Convert a wei amount to ether.")
                .required("wei", FieldKind::Uint, "Amount in wei, as a decimal or 0x-hex string."),
            format_ether
        ),
        tool!(
            ToolSpec::new("parseEther", "Convert an ether amount to wei.")
                .required("ether", FieldKind::Amount, "Amount in ether, e.g. \"1.5\"."),
            parse_ether
        ),
        tool!(
            ToolSpec::new("formatUnits", "Convert an integer amount of base units to a decimal string.")
                .required("value", FieldKind::Uint, "Amount in base units.")
                .required("unit", FieldKind::Text, "Number of decimals (e.g. 6) or a unit name such as gwei or ether."),
            format_units_tool
        ),
        tool!(
            ToolSpec::new("parseUnits", "Convert a decimal amount to an integer amount of base units.")
                .required("value", FieldKind::Amount, "Decimal amount, e.g. \"2.5\".")
                .required("unit", FieldKind::Text, "Number of decimals (e.g. 6) or a unit name such as gwei or ether."),
            parse_units_tool
        ),
    ]
}

/// Decimal rendering of `value` with `decimals` places, without trailing
/// zeros (`1000000000000000000` at 18 -> `1.0`).
pub fn display_units(value: U256, decimals: u32) -> Result<String, ToolError> {
    let formatted = format_units(value, decimals)
        .map_err(|e| ToolError::invalid("unit", "decimals", e.to_string()))?;
    if !formatted.contains('.') {
        return Ok(formatted);
    }
    let trimmed = formatted.trim_end_matches('0');
    Ok(if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    })
}

/// Converts the decimal `amount` given in `field` to base units.
pub fn to_base_units(field: &str, amount: &str, decimals: u32) -> Result<U256, ToolError> {
    let fraction_digits = amount.split_once('.').map_or(0, |(_, f)| f.len());
    if fraction_digits > decimals as usize {
        return Err(ToolError::invalid(
            field,
            "precision",
            format!(
                "'{}' has {} decimal places but at most {} are supported",
                amount, fraction_digits, decimals
            ),
        ));
    }
    parse_units(amount, decimals)
        .map(U256::from)
        .map_err(|e| ToolError::invalid(field, "amount", format!("cannot convert '{}': {}", amount, e)))
}

fn unit_decimals(unit: &str) -> Result<u32, ToolError> {
    let unit = unit.trim();
    if let Ok(decimals) = unit.parse::<u32>() {
        return Units::try_from(decimals)
            .map(|u| u.as_num())
            .map_err(|e| ToolError::invalid("unit", "decimals", e.to_string()));
    }
    Units::try_from(unit.to_lowercase().as_str())
        .map(|u| u.as_num())
        .map_err(|_| {
            ToolError::invalid(
                "unit",
                "unit",
                format!("'{}' is neither a decimal count nor a unit name like wei, gwei or ether", unit),
            )
        })
}

async fn format_ether(_state: &AppState, args: ValidatedArgs) -> ToolResult {
    let wei = args.uint("wei")?;
    Ok(ToolResponse::text(format!("{} wei = {} ETH", wei, display_units(wei, 18)?)))
}

async fn parse_ether(_state: &AppState, args: ValidatedArgs) -> ToolResult {
    let ether = args.amount("ether")?;
    let wei = to_base_units("ether", ether, 18)?;
    Ok(ToolResponse::text(format!("{} ETH = {} wei", ether, wei)))
}

async fn format_units_tool(_state: &AppState, args: ValidatedArgs) -> ToolResult {
    let value = args.uint("value")?;
    let decimals = unit_decimals(args.text("unit")?)?;
    Ok(ToolResponse::text(display_units(value, decimals)?))
}

async fn parse_units_tool(_state: &AppState, args: ValidatedArgs) -> ToolResult {
    let value = args.amount("value")?;
    let decimals = unit_decimals(args.text("unit")?)?;
    Ok(ToolResponse::text(to_base_units("value", value, decimals)?.to_string()))
}
