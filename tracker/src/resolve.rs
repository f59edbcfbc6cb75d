//! Field resolution over untyped API records.
//!
//! The market endpoints disagree on field names, nesting, and whether numbers
//! arrive as JSON numbers or strings. Each attribute has an ordered candidate
//! table below; resolution walks the table and takes the first usable value.
//! Candidates may be dotted paths (`"syToken.symbol"`).

use serde_json::Value;

/// Candidates for the USD value locked in a market, in priority order.
pub const LIQUIDITY_FIELDS: &[&str] = &[
    "liquidity",
    "totalLiquidity",
    "totalValueLocked",
    "volume",
    "reserveUsd",
    "liquidityUsd",
    "details.liquidity",
];

pub const APY_FIELDS: &[&str] = &["impliedApy", "details.impliedApy"];

/// Expiry candidates. Numeric values are Unix seconds.
pub const MATURITY_FIELDS: &[&str] = &["expiry", "maturity"];

pub const ID_FIELDS: &[&str] = &["address", "id", "marketAddress"];

pub const NAME_FIELDS: &[&str] = &["name"];

pub const TOKEN_SYMBOL_FIELDS: &[&str] = &["tokenSymbol"];

pub const SY_SYMBOL_FIELDS: &[&str] = &["syToken.symbol", "sy.symbol"];

pub const PT_SYMBOL_FIELDS: &[&str] = &["ptToken.symbol", "pt.symbol"];

/// Sub-keys tried, in order, when a numeric candidate holds an object.
const NESTED_NUMBER_KEYS: &[&str] = &["usd", "total"];

/// Follows a dotted path into `record`. Null counts as absent.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Coerces a JSON value to a finite number.
///
/// Accepts numbers and decimal strings. An object is searched one level deep
/// for a `usd` or `total` key.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => NESTED_NUMBER_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(coerce_scalar),
        other => coerce_scalar(other),
    }
}

fn coerce_scalar(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Returns the first candidate that resolves to a finite number, or `default`.
pub fn resolve_number(record: &Value, fields: &[&str], default: f64) -> f64 {
    try_resolve_number(record, fields).unwrap_or(default)
}

/// Like [`resolve_number`] but reports absence instead of substituting a default.
pub fn try_resolve_number(record: &Value, fields: &[&str]) -> Option<f64> {
    fields
        .iter()
        .filter_map(|field| lookup(record, field))
        .find_map(coerce_number)
}

/// Returns the first candidate holding a non-empty string. Numbers are
/// rendered, since some endpoints send numeric ids.
pub fn resolve_string(record: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| lookup(record, field))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
