//! Minimal ABI encoding for constructor arguments and simple calls.
//!
//! The deployment plans this crate consumes only ever pass flat value types
//! to constructors (addresses, integers, booleans, strings, raw bytes), so a
//! small hand-rolled encoder covers the whole surface. Encoding follows the
//! standard head/tail layout: static types occupy one 32-byte head word,
//! dynamic types put an offset in the head and length-prefixed padded data in
//! the tail.

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde_json::Value;

/// A plan argument resolved to a concrete ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArg {
    Address(Address),
    Uint(U256),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
}

impl ResolvedArg {
    /// The JSON form recorded in the artifact registry.
    pub fn to_json(&self) -> Value {
        match self {
            ResolvedArg::Address(a) => Value::String(a.to_checksum(None)),
            ResolvedArg::Uint(u) => Value::String(u.to_string()),
            ResolvedArg::Bool(b) => Value::Bool(*b),
            ResolvedArg::Str(s) => Value::String(s.clone()),
            ResolvedArg::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        }
    }
}

/// Resolve a literal JSON value from the plan against an ABI parameter type.
pub fn resolve_literal(param_type: &str, value: &Value) -> Result<ResolvedArg> {
    match param_type {
        "address" => {
            let s = value
                .as_str()
                .with_context(|| format!("Expected address string, got {}", value))?;
            let address: Address = s
                .parse()
                .with_context(|| format!("Invalid address literal '{}'", s))?;
            Ok(ResolvedArg::Address(address))
        }
        "bool" => value
            .as_bool()
            .map(ResolvedArg::Bool)
            .with_context(|| format!("Expected boolean, got {}", value)),
        "string" => value
            .as_str()
            .map(|s| ResolvedArg::Str(s.to_string()))
            .with_context(|| format!("Expected string, got {}", value)),
        "bytes" => {
            let s = value
                .as_str()
                .with_context(|| format!("Expected 0x-prefixed bytes string, got {}", value))?;
            let bytes = hex::decode(s.trim_start_matches("0x"))
                .with_context(|| format!("Invalid bytes literal '{}'", s))?;
            Ok(ResolvedArg::Bytes(bytes))
        }
        t if t.starts_with("uint") => {
            let uint = match value {
                Value::Number(n) => {
                    let n = n
                        .as_u64()
                        .with_context(|| format!("Expected unsigned integer, got {}", value))?;
                    U256::from(n)
                }
                Value::String(s) if s.starts_with("0x") => crate::rpc::parse_hex_u256(s)?,
                Value::String(s) => U256::from_str_radix(s, 10)
                    .with_context(|| format!("Invalid integer literal '{}'", s))?,
                _ => anyhow::bail!("Expected integer for {}, got {}", t, value),
            };
            Ok(ResolvedArg::Uint(uint))
        }
        other => anyhow::bail!("Unsupported constructor parameter type '{}'", other),
    }
}

/// ABI-encode a list of resolved arguments against their parameter types.
///
/// Returns the raw encoded bytes (no selector, no 0x prefix).
pub fn encode_args(param_types: &[String], args: &[ResolvedArg]) -> Result<Vec<u8>> {
    if param_types.len() != args.len() {
        anyhow::bail!(
            "Constructor expects {} argument(s), got {}",
            param_types.len(),
            args.len()
        );
    }

    for (ty, arg) in param_types.iter().zip(args) {
        check_type(ty, arg)?;
    }

    let head_size = 32 * args.len();
    let mut head: Vec<u8> = Vec::with_capacity(head_size);
    let mut tail: Vec<u8> = Vec::new();

    for arg in args {
        match arg {
            ResolvedArg::Address(a) => head.extend_from_slice(&encode_address(a)),
            ResolvedArg::Uint(u) => head.extend_from_slice(&u.to_be_bytes::<32>()),
            ResolvedArg::Bool(b) => {
                let mut word = [0u8; 32];
                word[31] = *b as u8;
                head.extend_from_slice(&word);
            }
            ResolvedArg::Str(s) => {
                head.extend_from_slice(&encode_offset(head_size + tail.len()));
                tail.extend_from_slice(&encode_dynamic(s.as_bytes()));
            }
            ResolvedArg::Bytes(b) => {
                head.extend_from_slice(&encode_offset(head_size + tail.len()));
                tail.extend_from_slice(&encode_dynamic(b));
            }
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

/// Encode a function call: 4-byte selector followed by encoded arguments.
///
/// `selector` is the first four bytes of the function signature hash, as a
/// hex string without 0x prefix (e.g. "40c10f19" for mint(address,uint256)).
pub fn encode_call(selector: &str, param_types: &[String], args: &[ResolvedArg]) -> Result<String> {
    let encoded = encode_args(param_types, args)?;
    Ok(format!("0x{}{}", selector, hex::encode(encoded)))
}

fn check_type(ty: &str, arg: &ResolvedArg) -> Result<()> {
    let ok = matches!(
        (ty, arg),
        ("address", ResolvedArg::Address(_))
            | ("bool", ResolvedArg::Bool(_))
            | ("string", ResolvedArg::Str(_))
            | ("bytes", ResolvedArg::Bytes(_))
    ) || (ty.starts_with("uint") && matches!(arg, ResolvedArg::Uint(_)));

    if !ok {
        anyhow::bail!("Argument {:?} does not match parameter type '{}'", arg, ty);
    }
    Ok(())
}

fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

fn encode_offset(offset: usize) -> [u8; 32] {
    U256::from(offset).to_be_bytes::<32>()
}

/// Length word followed by the data padded to a 32-byte boundary.
fn encode_dynamic(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + data.len().div_ceil(32) * 32);
    out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
    out.extend_from_slice(data);
    let pad = data.len().div_ceil(32) * 32 - data.len();
    out.extend(std::iter::repeat_n(0u8, pad));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_address_and_uint() {
        let addr = Address::from_str("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap();
        let encoded = encode_args(
            &types(&["address", "uint256"]),
            &[ResolvedArg::Address(addr), ResolvedArg::Uint(U256::from(7u64))],
        )
        .unwrap();

        assert_eq!(encoded.len(), 64);
        assert_eq!(
            hex::encode(&encoded[..32]),
            "00000000000000000000000070997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
        assert_eq!(
            hex::encode(&encoded[32..]),
            "0000000000000000000000000000000000000000000000000000000000000007"
        );
    }

    #[test]
    fn test_encode_string() {
        let encoded = encode_args(
            &types(&["string"]),
            &[ResolvedArg::Str("abc".to_string())],
        )
        .unwrap();

        // offset word, length word, padded data
        assert_eq!(
            hex::encode(&encoded),
            "0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000003\
             6162630000000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_encode_mixed_static_dynamic() {
        let addr = Address::from_str("0x0000000000000000000000000000000000000001").unwrap();
        let encoded = encode_args(
            &types(&["address", "string", "uint256"]),
            &[
                ResolvedArg::Address(addr),
                ResolvedArg::Str("hi".to_string()),
                ResolvedArg::Uint(U256::from(2u64)),
            ],
        )
        .unwrap();

        // Head: address, offset (3 * 32 = 0x60), uint. Tail: length + data.
        assert_eq!(encoded.len(), 32 * 5);
        assert_eq!(
            hex::encode(&encoded[32..64]),
            "0000000000000000000000000000000000000000000000000000000000000060"
        );
        assert_eq!(
            hex::encode(&encoded[96..128]),
            "0000000000000000000000000000000000000000000000000000000000000002"
        );
    }

    #[test]
    fn test_encode_call_mint() {
        let addr = Address::from_str("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap();
        let calldata = encode_call(
            "40c10f19",
            &types(&["address", "uint256"]),
            &[
                ResolvedArg::Address(addr),
                ResolvedArg::Uint(U256::from(100u64)),
            ],
        )
        .unwrap();

        assert!(calldata.starts_with("0x40c10f19"));
        // 2 + 8 selector chars + 2 * 64 argument chars
        assert_eq!(calldata.len(), 2 + 8 + 128);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = encode_args(&types(&["uint256"]), &[]).unwrap_err();
        assert!(err.to_string().contains("expects 1"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode_args(
            &types(&["address"]),
            &[ResolvedArg::Uint(U256::from(1u64))],
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_resolve_literal() {
        assert_eq!(
            resolve_literal("uint256", &serde_json::json!(42)).unwrap(),
            ResolvedArg::Uint(U256::from(42u64))
        );
        assert_eq!(
            resolve_literal("uint256", &serde_json::json!("1000000")).unwrap(),
            ResolvedArg::Uint(U256::from(1_000_000u64))
        );
        assert_eq!(
            resolve_literal("string", &serde_json::json!("https://example.com/{id}.json"))
                .unwrap(),
            ResolvedArg::Str("https://example.com/{id}.json".to_string())
        );
        assert_eq!(
            resolve_literal("bool", &serde_json::json!(true)).unwrap(),
            ResolvedArg::Bool(true)
        );
        assert!(resolve_literal("address", &serde_json::json!("nonsense")).is_err());
        assert!(resolve_literal("tuple", &serde_json::json!({})).is_err());
    }
}
