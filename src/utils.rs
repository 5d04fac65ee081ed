//! Utility functions for the EVM wallet MCP server

use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::to_checksum;
use serde::de::DeserializeOwned;
use serde::Serializer;
use serde_json::{from_value, Value};
use std::str::FromStr;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::blockchain::error::EffectError;
use crate::mcp::protocol::{error_codes, Response};

/// Deserialize a tool's arguments into `T` and run its validation rules.
pub fn parse_args<T: DeserializeOwned + Validate>(args: &Value, req_id: &Value) -> Result<T, Response> {
    let parsed: T = from_value(args.clone()).map_err(|e| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Invalid arguments: {}", e),
        )
    })?;
    parsed.validate().map_err(|errors| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            describe_validation_errors(&errors),
        )
    })?;
    Ok(parsed)
}

fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    collect_validation_errors("", errors, &mut parts);
    parts.sort();
    format!("Invalid arguments: {}", parts.join("; "))
}

fn collect_validation_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => out.extend(errs.iter().map(|err| match &err.message {
                Some(msg) => format!("'{}': {}", path, msg),
                None => format!("'{}': failed '{}' check", path, err.code),
            })),
            ValidationErrorsKind::Struct(nested) => collect_validation_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_errors(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn is_hex_of_len(value: &str, hex_len: usize) -> bool {
    match value.strip_prefix("0x") {
        Some(body) => body.len() == hex_len && body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn is_address(value: &str) -> bool {
    is_hex_of_len(value, 40)
}

pub fn validate_address(value: &str) -> Result<(), ValidationError> {
    if is_address(value) {
        Ok(())
    } else {
        Err(rule("address", "expected 0x followed by 40 hex characters"))
    }
}

pub fn validate_tx_hash(value: &str) -> Result<(), ValidationError> {
    if is_hex_of_len(value, 64) {
        Ok(())
    } else {
        Err(rule("hash", "expected 0x followed by 64 hex characters"))
    }
}

pub fn validate_hex_data(value: &str) -> Result<(), ValidationError> {
    match value.strip_prefix("0x") {
        Some(body) if body.len() % 2 == 0 && body.chars().all(|c| c.is_ascii_hexdigit()) => Ok(()),
        _ => Err(rule("hex", "expected 0x-prefixed hex bytes")),
    }
}

pub fn validate_decimal_amount(value: &str) -> Result<(), ValidationError> {
    if U256::from_dec_str(value).is_ok() {
        Ok(())
    } else {
        Err(rule("amount", "expected a non-negative integer in the smallest unit"))
    }
}

pub fn parse_address(value: &str, field: &str) -> Result<Address, EffectError> {
    if !is_address(value) {
        return Err(EffectError::validation(format!(
            "Invalid {} '{}': expected 0x followed by 40 hex characters",
            field, value
        )));
    }
    Address::from_str(value)
        .map_err(|e| EffectError::validation(format!("Invalid {} '{}': {}", field, value, e)))
}

pub fn parse_tx_hash(value: &str) -> Result<H256, EffectError> {
    if !is_hex_of_len(value, 64) {
        return Err(EffectError::validation(format!(
            "Invalid transaction hash '{}': expected 0x followed by 64 hex characters",
            value
        )));
    }
    H256::from_str(value)
        .map_err(|e| EffectError::validation(format!("Invalid transaction hash '{}': {}", value, e)))
}

pub fn parse_amount(value: &str, field: &str) -> Result<U256, EffectError> {
    U256::from_dec_str(value).map_err(|_| {
        EffectError::validation(format!(
            "Invalid {} '{}': expected a non-negative integer",
            field, value
        ))
    })
}

pub fn parse_hex_data(value: &str, field: &str) -> Result<Bytes, EffectError> {
    validate_hex_data(value).map_err(|_| {
        EffectError::validation(format!("Invalid {} '{}': expected 0x-prefixed hex bytes", field, value))
    })?;
    hex::decode(&value[2..])
        .map(Bytes::from)
        .map_err(|e| EffectError::validation(format!("Invalid {}: {}", field, e)))
}

pub fn to_checksum_string(address: &Address) -> String {
    to_checksum(address, None)
}

/// Render an integer amount of the smallest unit as a decimal string.
///
/// Exact integer arithmetic; trailing zeros of the fraction are dropped.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    // 10^78 no longer fits in a U256; every value is then a pure fraction.
    let (whole, remainder) = if decimals > 77 {
        (U256::zero(), value)
    } else {
        value.div_mod(U256::exp10(decimals as usize))
    };

    if remainder.is_zero() {
        return whole.to_string();
    }
    let padded = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    let trimmed = padded.trim_end_matches('0');
    format!("{}.{}", whole, trimmed)
}

pub fn serialize_u256_dec<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_wei_exactly() {
        assert_eq!(format_units(U256::from(420_000_000_000_000u64), 18), "0.00042");
        assert_eq!(format_units(U256::exp10(18), 18), "1");
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::one(), 18), "0.000000000000000001");
        assert_eq!(format_units(U256::zero(), 18), "0");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn recognises_boundary_formats() {
        assert!(is_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!is_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!is_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226"));
        assert!(validate_tx_hash(&format!("0x{}", "ab".repeat(32))).is_ok());
        assert!(validate_tx_hash("0x1234").is_err());
        assert!(validate_hex_data("0x").is_ok());
        assert!(validate_hex_data("0xabc").is_err());
    }

    #[test]
    fn parse_address_reports_field() {
        let err = parse_address("nope", "recipient").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("recipient"));
    }
}
