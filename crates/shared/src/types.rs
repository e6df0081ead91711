use chrono::{DateTime, Local};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// Shared data structures used by the refresh pipeline and the web surface

pub const LOADING_PLACEHOLDER: &str = "Loading...";
pub const UNAVAILABLE_MARKER: &str = "N/A";
pub const NOT_UPDATED_PLACEHOLDER: &str = "Not updated yet";
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A tracked asset: the identifier the price API knows it by plus its ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

impl Asset {
    pub fn from_id(id: &str) -> Self {
        let id = id.trim().to_lowercase();
        let (symbol, name) = match id.as_str() {
            "bitcoin" => ("BTC".to_string(), "Bitcoin".to_string()),
            "ethereum" => ("ETH".to_string(), "Ethereum".to_string()),
            "solana" => ("SOL".to_string(), "Solana".to_string()),
            "cardano" => ("ADA".to_string(), "Cardano".to_string()),
            "ripple" => ("XRP".to_string(), "XRP".to_string()),
            "dogecoin" => ("DOGE".to_string(), "Dogecoin".to_string()),
            "litecoin" => ("LTC".to_string(), "Litecoin".to_string()),
            "polkadot" => ("DOT".to_string(), "Polkadot".to_string()),
            other => {
                let symbol: String = other.chars().take(3).collect::<String>().to_uppercase();
                let mut chars = other.chars();
                let name = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                (symbol, name)
            }
        };

        Asset { id, symbol, name }
    }
}

/// A single price reading. `Loading` only ever appears before the first
/// fetch; `Unavailable` marks a failed or missing field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceValue {
    Loading,
    Unavailable,
    Price(f64),
}

impl PriceValue {
    pub fn is_present(&self) -> bool {
        matches!(self, PriceValue::Price(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PriceValue::Unavailable)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PriceValue::Price(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceValue::Loading => f.write_str(LOADING_PLACEHOLDER),
            PriceValue::Unavailable => f.write_str(UNAVAILABLE_MARKER),
            PriceValue::Price(p) => write!(f, "{}", p),
        }
    }
}

// Prices go over the wire as plain numbers, placeholders as their display text
impl Serialize for PriceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PriceValue::Price(p) => serializer.serialize_f64(*p),
            PriceValue::Loading => serializer.serialize_str(LOADING_PLACEHOLDER),
            PriceValue::Unavailable => serializer.serialize_str(UNAVAILABLE_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for PriceValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(p) => PriceValue::Price(p),
            Raw::Text(t) if t == LOADING_PLACEHOLDER => PriceValue::Loading,
            Raw::Text(_) => PriceValue::Unavailable,
        })
    }
}

/// One point-in-time read of every tracked asset, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub entries: Vec<(Asset, PriceValue)>,
}

impl PriceSnapshot {
    pub fn new(entries: Vec<(Asset, PriceValue)>) -> Self {
        PriceSnapshot { entries }
    }

    pub fn filled(assets: &[Asset], value: PriceValue) -> Self {
        PriceSnapshot {
            entries: assets.iter().map(|a| (a.clone(), value)).collect(),
        }
    }

    pub fn unavailable(assets: &[Asset]) -> Self {
        Self::filled(assets, PriceValue::Unavailable)
    }

    pub fn loading(assets: &[Asset]) -> Self {
        Self::filled(assets, PriceValue::Loading)
    }

    pub fn get(&self, asset_id: &str) -> Option<PriceValue> {
        self.entries
            .iter()
            .find(|(asset, _)| asset.id == asset_id)
            .map(|(_, value)| *value)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<PriceValue> {
        self.entries
            .iter()
            .find(|(asset, _)| asset.symbol.eq_ignore_ascii_case(symbol))
            .map(|(_, value)| *value)
    }

    pub fn missing(&self) -> Vec<&Asset> {
        self.entries
            .iter()
            .filter(|(_, value)| !value.is_present())
            .map(|(asset, _)| asset)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|(_, value)| value.is_present())
    }

    pub fn is_all_unavailable(&self) -> bool {
        self.entries.iter().all(|(_, value)| value.is_unavailable())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Asset, PriceValue)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub captured_at: DateTime<Local>,
    pub snapshot: PriceSnapshot,
}

/// Samples from one collection run, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub samples: Vec<PriceSample>,
}

impl PriceHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        PriceHistory {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: PriceSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn degraded_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.snapshot.is_all_unavailable())
            .count()
    }

    /// Flattens the history into `{time, <asset id>: price, ...}` records.
    pub fn to_records(&self) -> Vec<ChartRecord> {
        self.samples
            .iter()
            .map(|sample| ChartRecord {
                time: sample.captured_at.format(TIME_FORMAT).to_string(),
                prices: sample
                    .snapshot
                    .iter()
                    .map(|(asset, value)| (asset.id.clone(), value.as_f64()))
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub time: String,
    #[serde(flatten)]
    pub prices: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// What the page and the JSON endpoint render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardView {
    pub btc_price: PriceValue,
    pub eth_price: PriceValue,
    pub sol_price: PriceValue,
    pub last_update: String,
    pub timestamp: i64,
    pub status: HealthStatus,
    pub error_count: u32,
    pub last_successful_update: Option<String>,
    pub prices: BTreeMap<String, PriceValue>,
}
