//! Turns a simple-price response body into a [`PriceSnapshot`].
//!
//! The body is a JSON object keyed by asset id, each holding a map from
//! currency code to price:
//!
//! ```text
//! {"bitcoin": {"usd": 67012.0}, "ethereum": {"usd": 3120.5}}
//! ```
//!
//! A missing asset or currency is not an error; it becomes
//! [`PriceValue::Unavailable`] for that asset only.

use log::warn;
use serde_json::Value;

use crate::error::ParseError;
use shared::{Asset, PriceSnapshot, PriceValue};

pub fn parse_snapshot(body: &str, assets: &[Asset], currency: &str) -> Result<PriceSnapshot, ParseError> {
    let json: Value = serde_json::from_str(body)?;
    let object = match &json {
        Value::Object(map) => map,
        Value::Array(_) => return Err(ParseError::NotAnObject("array")),
        Value::Null => return Err(ParseError::NotAnObject("null")),
        Value::Bool(_) => return Err(ParseError::NotAnObject("bool")),
        Value::Number(_) => return Err(ParseError::NotAnObject("number")),
        Value::String(_) => return Err(ParseError::NotAnObject("string")),
    };

    let entries = assets
        .iter()
        .map(|asset| {
            let raw = object.get(&asset.id).and_then(|quotes| quotes.get(currency));
            (asset.clone(), price_from_json(asset, currency, raw))
        })
        .collect();

    Ok(PriceSnapshot::new(entries))
}

fn price_from_json(asset: &Asset, currency: &str, raw: Option<&Value>) -> PriceValue {
    match raw {
        None => PriceValue::Unavailable,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(price) => PriceValue::Price(price),
            None => {
                warn!("{} price in {} is not representable: {}", asset.symbol, currency, n);
                PriceValue::Unavailable
            }
        },
        // Some upstreams quote as strings; accept them but flag the anomaly
        Some(Value::String(s)) => {
            warn!("{} price in {} is a string ({:?}), expected a number", asset.symbol, currency, s);
            match s.trim().parse::<f64>() {
                Ok(price) if price.is_finite() => PriceValue::Price(price),
                _ => PriceValue::Unavailable,
            }
        }
        Some(other) => {
            warn!("{} price in {} has unexpected type: {}", asset.symbol, currency, other);
            PriceValue::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_assets() -> Vec<Asset> {
        ["bitcoin", "ethereum", "solana"]
            .iter()
            .map(|id| Asset::from_id(id))
            .collect()
    }

    #[test]
    fn test_parse_complete_response() {
        let body = r#"{
            "bitcoin": {"usd": 67012.0},
            "ethereum": {"usd": 3120.5},
            "solana": {"usd": 148}
        }"#;

        let snapshot = parse_snapshot(body, &test_assets(), "usd").unwrap();
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.get("bitcoin"), Some(PriceValue::Price(67012.0)));
        assert_eq!(snapshot.get("ethereum"), Some(PriceValue::Price(3120.5)));
        assert_eq!(snapshot.get("solana"), Some(PriceValue::Price(148.0)));
    }

    #[test]
    fn test_parse_keeps_configured_order() {
        let body = r#"{"solana": {"usd": 1}, "bitcoin": {"usd": 2}, "ethereum": {"usd": 3}}"#;
        let snapshot = parse_snapshot(body, &test_assets(), "usd").unwrap();
        let ids: Vec<&str> = snapshot.iter().map(|(a, _)| a.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum", "solana"]);
    }

    #[test]
    fn test_missing_asset_is_unavailable() {
        let body = r#"{"bitcoin": {"usd": 67012.0}, "solana": {"usd": 148.2}}"#;
        let snapshot = parse_snapshot(body, &test_assets(), "usd").unwrap();
        assert_eq!(snapshot.get("ethereum"), Some(PriceValue::Unavailable));
        assert_eq!(snapshot.missing().len(), 1);
    }

    #[test]
    fn test_missing_currency_is_unavailable() {
        let body = r#"{"bitcoin": {"eur": 61000.0}, "ethereum": {"usd": 3120.5}, "solana": {"usd": 148.2}}"#;
        let snapshot = parse_snapshot(body, &test_assets(), "usd").unwrap();
        assert_eq!(snapshot.get("bitcoin"), Some(PriceValue::Unavailable));
    }

    #[test]
    fn test_string_price_passes_through() {
        let body = r#"{"bitcoin": {"usd": "67012.5"}, "ethereum": {"usd": "n/a"}, "solana": {"usd": true}}"#;
        let snapshot = parse_snapshot(body, &test_assets(), "usd").unwrap();
        assert_eq!(snapshot.get("bitcoin"), Some(PriceValue::Price(67012.5)));
        assert_eq!(snapshot.get("ethereum"), Some(PriceValue::Unavailable));
        assert_eq!(snapshot.get("solana"), Some(PriceValue::Unavailable));
    }

    #[test]
    fn test_empty_object_is_all_unavailable() {
        let snapshot = parse_snapshot("{}", &test_assets(), "usd").unwrap();
        assert!(snapshot.is_all_unavailable());
    }

    #[test]
    fn test_malformed_json_is_error() {
        let result = parse_snapshot("{\"bitcoin\": {\"usd\": ", &test_assets(), "usd");
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn test_non_object_is_error() {
        let result = parse_snapshot("[1, 2, 3]", &test_assets(), "usd");
        assert!(matches!(result, Err(ParseError::NotAnObject("array"))));

        let result = parse_snapshot("null", &test_assets(), "usd");
        assert!(matches!(result, Err(ParseError::NotAnObject("null"))));
    }
}
