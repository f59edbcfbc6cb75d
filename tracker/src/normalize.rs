//! Turns raw market summaries and details into [`Market`] records.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::error::LoadError;
use crate::resolve::{
    coerce_number, lookup, resolve_number, resolve_string, try_resolve_number, APY_FIELDS,
    ID_FIELDS, LIQUIDITY_FIELDS, MATURITY_FIELDS, NAME_FIELDS, PT_SYMBOL_FIELDS,
    SY_SYMBOL_FIELDS, TOKEN_SYMBOL_FIELDS,
};
use crate::Market;

pub const UNKNOWN_MARKET: &str = "Unknown Market";

/// Builds a market from its list summary and, when the detail fetch succeeded,
/// its detail record. Detail fields take priority over summary fields.
///
/// `index` is the market's position in the batch and only matters when the
/// summary carries no identifier at all.
pub fn normalize(summary: &Value, detail: Option<&Value>, chain_id: u64, index: usize) -> Market {
    let address = market_address(summary);
    let id = address.clone().unwrap_or_else(|| format!("market-{}", index));

    let apy = detail
        .and_then(|d| try_resolve_number(d, APY_FIELDS))
        .unwrap_or_else(|| resolve_number(summary, APY_FIELDS, 0.0));

    // the detail record is the authority when present, even if it lacks liquidity
    let liquidity = match detail {
        Some(d) => resolve_number(d, LIQUIDITY_FIELDS, 0.0),
        None => resolve_number(summary, LIQUIDITY_FIELDS, 0.0),
    };

    let maturity = detail
        .and_then(resolve_maturity)
        .or_else(|| resolve_maturity(summary));

    let symbol = detail
        .and_then(resolve_symbol)
        .or_else(|| resolve_symbol(summary));

    Market {
        id,
        address,
        name: resolve_name(summary, detail),
        symbol,
        chain_id,
        implied_apy: apy.max(0.0),
        liquidity: liquidity.max(0.0),
        maturity,
        historical_data: Vec::new(),
    }
}

/// The identifier the API knows this market by, if the summary has one.
pub fn market_address(summary: &Value) -> Option<String> {
    resolve_string(summary, ID_FIELDS)
}

fn resolve_name(summary: &Value, detail: Option<&Value>) -> String {
    detail
        .and_then(name_from)
        .or_else(|| name_from(summary))
        .unwrap_or_else(|| UNKNOWN_MARKET.to_string())
}

fn name_from(record: &Value) -> Option<String> {
    resolve_string(record, NAME_FIELDS)
        .or_else(|| resolve_string(record, TOKEN_SYMBOL_FIELDS))
        .or_else(|| {
            let sy = resolve_string(record, SY_SYMBOL_FIELDS);
            let pt = resolve_string(record, PT_SYMBOL_FIELDS);
            if sy.is_none() && pt.is_none() {
                return None;
            }
            Some(format!(
                "{}/{}",
                sy.as_deref().unwrap_or("SY"),
                pt.as_deref().unwrap_or("PT")
            ))
        })
}

fn resolve_symbol(record: &Value) -> Option<String> {
    resolve_string(record, PT_SYMBOL_FIELDS).or_else(|| resolve_string(record, &["symbol"]))
}

/// Expiry as a calendar date. Numbers are Unix seconds; strings may also be
/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates.
fn resolve_maturity(record: &Value) -> Option<NaiveDate> {
    MATURITY_FIELDS
        .iter()
        .filter_map(|field| lookup(record, field))
        .find_map(parse_maturity)
}

fn parse_maturity(value: &Value) -> Option<NaiveDate> {
    if let Some(secs) = coerce_number(value) {
        return DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.date_naive());
    }
    let s = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

/// Pulls the list of market summaries out of a "list markets" response.
///
/// Accepts a bare array, `{results: [...]}`, `{data: [...]}`, a single market
/// object, or failing those the first array-valued property.
pub fn market_list(response: Value) -> Result<Vec<Value>, LoadError> {
    let markets = match response {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("results") {
                items
            } else if let Some(Value::Array(items)) = map.remove("data") {
                items
            } else if ID_FIELDS.iter().any(|k| map.contains_key(*k)) {
                vec![Value::Object(map)]
            } else if let Some(items) = map.into_iter().find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            }) {
                items
            } else {
                return Err(LoadError::Malformed(
                    "object contains no market array".to_string(),
                ));
            }
        }
        other => {
            return Err(LoadError::Malformed(format!(
                "expected an array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    if markets.is_empty() {
        return Err(LoadError::NoMarkets);
    }
    Ok(markets)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A small built-in market set shown when the list call fails and the
/// dashboard is configured to never come up empty.
pub fn fallback_markets(chain_id: u64) -> Vec<Market> {
    [
        ("fallback-1", "stETH-PT", "stETH", 0.052, 500_000.0, (2024, 12, 31)),
        ("fallback-2", "ezETH-PT", "ezETH", 0.061, 800_000.0, (2025, 1, 31)),
        ("fallback-3", "sDAI-PT", "sDAI", 0.038, 300_000.0, (2024, 11, 30)),
    ]
    .into_iter()
    .map(|(id, name, symbol, apy, liquidity, (y, m, d))| Market {
        id: id.to_string(),
        address: None,
        name: name.to_string(),
        symbol: Some(symbol.to_string()),
        chain_id,
        implied_apy: apy,
        liquidity,
        maturity: NaiveDate::from_ymd_opt(y, m, d),
        historical_data: Vec::new(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detail_enriches_summary() {
        let summary = json!({ "address": "A", "impliedApy": 0.01 });
        let detail = json!({
            "impliedApy": 0.052,
            "totalValueLocked": 1250000,
            "expiry": 1735603200,
        });

        let market = normalize(&summary, Some(&detail), 8453, 0);
        assert_eq!(market.id, "A");
        assert_eq!(market.address.as_deref(), Some("A"));
        assert_eq!(market.implied_apy, 0.052);
        assert_eq!(market.liquidity, 1250000.0);
        assert_eq!(market.maturity, NaiveDate::from_ymd_opt(2024, 12, 31));
        assert_eq!(market.chain_id, 8453);
    }

    #[test]
    fn test_summary_only_defaults() {
        let market = normalize(&json!({}), None, 1, 3);
        assert_eq!(market.id, "market-3");
        assert_eq!(market.address, None);
        assert_eq!(market.name, UNKNOWN_MARKET);
        assert_eq!(market.implied_apy, 0.0);
        assert_eq!(market.liquidity, 0.0);
        assert_eq!(market.maturity, None);
        assert!(market.historical_data.is_empty());
    }

    #[test]
    fn test_falls_back_to_summary_fields() {
        let summary = json!({
            "id": "m-7",
            "impliedApy": "0.031",
            "liquidity": { "usd": "2500.5" },
            "maturity": "2025-06-26T00:00:00.000Z",
        });
        let market = normalize(&summary, None, 42161, 0);
        assert_eq!(market.id, "m-7");
        assert_eq!(market.implied_apy, 0.031);
        assert_eq!(market.liquidity, 2500.5);
        assert_eq!(market.maturity, NaiveDate::from_ymd_opt(2025, 6, 26));
    }

    #[test]
    fn test_detail_without_apy_uses_summary_apy() {
        let summary = json!({ "address": "A", "impliedApy": 0.04 });
        let detail = json!({ "liquidity": 10 });
        let market = normalize(&summary, Some(&detail), 1, 0);
        assert_eq!(market.implied_apy, 0.04);
        assert_eq!(market.liquidity, 10.0);
    }

    #[test]
    fn test_name_resolution_order() {
        let summary = json!({ "name": "Summary Name" });

        let detail = json!({ "name": "Detail Name", "tokenSymbol": "TKN" });
        assert_eq!(normalize(&summary, Some(&detail), 1, 0).name, "Detail Name");

        let detail = json!({ "tokenSymbol": "TKN" });
        assert_eq!(normalize(&summary, Some(&detail), 1, 0).name, "TKN");

        let detail = json!({ "ptToken": { "symbol": "PT-stETH" } });
        assert_eq!(
            normalize(&summary, Some(&detail), 1, 0).name,
            "SY/PT-stETH"
        );

        let detail = json!({ "impliedApy": 0.1 });
        assert_eq!(normalize(&summary, Some(&detail), 1, 0).name, "Summary Name");

        let summary = json!({ "syToken": { "symbol": "SY-ezETH" } });
        assert_eq!(normalize(&summary, None, 1, 0).name, "SY-ezETH/PT");
    }

    #[test]
    fn test_negative_values_clamp_to_zero() {
        let summary = json!({ "impliedApy": -0.2, "liquidity": "-5" });
        let market = normalize(&summary, None, 1, 0);
        assert_eq!(market.implied_apy, 0.0);
        assert_eq!(market.liquidity, 0.0);
    }

    #[test]
    fn test_market_list_shapes() {
        assert_eq!(market_list(json!([{ "address": "A" }])).unwrap().len(), 1);
        assert_eq!(
            market_list(json!({ "results": [{ "address": "A" }, { "address": "B" }] }))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(market_list(json!({ "data": [{ "id": 1 }] })).unwrap().len(), 1);
        assert_eq!(
            market_list(json!({ "address": "A", "name": "single" })).unwrap()[0]["name"],
            "single"
        );
        assert_eq!(
            market_list(json!({ "total": 1, "markets": [{ "address": "A" }] }))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_market_list_errors() {
        assert!(matches!(market_list(json!([])), Err(LoadError::NoMarkets)));
        assert!(matches!(
            market_list(json!({ "results": [] })),
            Err(LoadError::NoMarkets)
        ));
        assert!(matches!(
            market_list(json!("oops")),
            Err(LoadError::Malformed(_))
        ));
        assert!(matches!(
            market_list(json!({ "status": "ok" })),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_fallback_markets() {
        let markets = fallback_markets(8453);
        assert_eq!(markets.len(), 3);
        assert!(markets.iter().all(|m| m.chain_id == 8453));
        assert!((markets[0].apy_percent() - 5.2).abs() < 1e-9);
    }
}
