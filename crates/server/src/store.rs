//! Process-wide dashboard state.
//!
//! Readers take an `Arc` to the current [`DashboardState`]; the refresh
//! coordinator builds the next state off to the side and swaps it in, so a
//! reader never sees half of a cycle.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use shared::{
    Asset, DashboardView, HealthStatus, PriceSnapshot, PriceValue, NOT_UPDATED_PLACEHOLDER, TIME_FORMAT,
};

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    /// Last known value per asset; never regresses from a price to unavailable.
    pub prices: PriceSnapshot,
    pub last_update: Option<DateTime<Local>>,
    pub last_successful_update: Option<DateTime<Local>>,
    pub error_count: u32,
    pub status: HealthStatus,
    pub timestamp: i64,
    pub cycles_completed: u64,
}

impl DashboardState {
    pub fn initial(assets: &[Asset]) -> Self {
        DashboardState {
            prices: PriceSnapshot::loading(assets),
            last_update: None,
            last_successful_update: None,
            error_count: 0,
            status: HealthStatus::Ok,
            timestamp: Local::now().timestamp(),
            cycles_completed: 0,
        }
    }

    pub fn price_for(&self, asset_id: &str) -> PriceValue {
        self.prices.get(asset_id).unwrap_or(PriceValue::Loading)
    }

    pub fn view(&self) -> DashboardView {
        // Page fields are keyed by API id; derived symbols of unknown ids may clash
        DashboardView {
            btc_price: self.price_for("bitcoin"),
            eth_price: self.price_for("ethereum"),
            sol_price: self.price_for("solana"),
            last_update: self
                .last_update
                .map(|t| t.format(TIME_FORMAT).to_string())
                .unwrap_or_else(|| NOT_UPDATED_PLACEHOLDER.to_string()),
            timestamp: self.timestamp,
            status: self.status,
            error_count: self.error_count,
            last_successful_update: self
                .last_successful_update
                .map(|t| t.format(TIME_FORMAT).to_string()),
            prices: self
                .prices
                .iter()
                .map(|(asset, value)| (asset.symbol.clone(), *value))
                .collect::<BTreeMap<_, _>>(),
        }
    }
}

pub struct DashboardStore {
    current: RwLock<Arc<DashboardState>>,
}

impl DashboardStore {
    pub fn new(assets: &[Asset]) -> Self {
        DashboardStore {
            current: RwLock::new(Arc::new(DashboardState::initial(assets))),
        }
    }

    pub fn snapshot(&self) -> Arc<DashboardState> {
        self.current.read().clone()
    }

    pub fn view(&self) -> DashboardView {
        self.snapshot().view()
    }

    pub fn has_completed_cycle(&self) -> bool {
        self.current.read().cycles_completed > 0
    }

    /// Derives the next state from the current one under the write lock.
    pub(crate) fn update<F>(&self, f: F) -> Arc<DashboardState>
    where
        F: FnOnce(&DashboardState) -> DashboardState,
    {
        let mut guard = self.current.write();
        let next = Arc::new(f(&guard));
        *guard = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn test_assets() -> Vec<Asset> {
        ["bitcoin", "ethereum", "solana"]
            .iter()
            .map(|id| Asset::from_id(id))
            .collect()
    }

    #[test]
    fn test_initial_state_is_placeholders() {
        let store = DashboardStore::new(&test_assets());
        let state = store.snapshot();

        assert_eq!(state.price_for("bitcoin"), PriceValue::Loading);
        assert_eq!(state.status, HealthStatus::Ok);
        assert_eq!(state.error_count, 0);
        assert!(state.last_successful_update.is_none());
        assert!(!store.has_completed_cycle());

        let view = store.view();
        assert_eq!(view.btc_price, PriceValue::Loading);
        assert_eq!(view.last_update, "Not updated yet");
        assert!(view.last_successful_update.is_none());
    }

    #[test]
    fn test_view_maps_symbols() {
        let assets = test_assets();
        let mut state = DashboardState::initial(&assets);
        state.prices = PriceSnapshot::new(vec![
            (assets[0].clone(), PriceValue::Price(67012.0)),
            (assets[1].clone(), PriceValue::Price(3120.5)),
            (assets[2].clone(), PriceValue::Unavailable),
        ]);
        state.last_update = Some(Local::now());

        let view = state.view();
        assert_eq!(view.btc_price, PriceValue::Price(67012.0));
        assert_eq!(view.eth_price, PriceValue::Price(3120.5));
        assert_eq!(view.sol_price, PriceValue::Unavailable);
        assert_eq!(view.prices.get("ETH"), Some(&PriceValue::Price(3120.5)));
        assert_ne!(view.last_update, "Not updated yet");
    }

    #[test]
    fn test_view_without_default_symbols() {
        let assets = vec![Asset::from_id("cardano")];
        let state = DashboardState::initial(&assets);
        let view = state.view();
        assert_eq!(view.btc_price, PriceValue::Loading);
        assert_eq!(view.prices.get("ADA"), Some(&PriceValue::Loading));
    }

    #[test]
    fn test_view_ignores_symbol_clash_from_unknown_id() {
        // "solar" derives the symbol SOL but is not solana
        let assets = vec![Asset::from_id("bitcoin"), Asset::from_id("solar")];
        assert_eq!(assets[1].symbol, "SOL");

        let mut state = DashboardState::initial(&assets);
        state.prices = PriceSnapshot::filled(&assets, PriceValue::Price(2.0));

        let view = state.view();
        assert_eq!(view.btc_price, PriceValue::Price(2.0));
        assert_eq!(view.sol_price, PriceValue::Loading);
    }

    #[test]
    fn test_update_swaps_whole_state() {
        let assets = test_assets();
        let store = DashboardStore::new(&assets);
        let before = store.snapshot();

        store.update(|prev| DashboardState {
            prices: PriceSnapshot::filled(&assets, PriceValue::Price(1.0)),
            cycles_completed: 1,
            ..prev.clone()
        });

        // readers holding the old Arc keep a consistent view
        assert_eq!(before.price_for("bitcoin"), PriceValue::Loading);
        assert_eq!(store.snapshot().price_for("bitcoin"), PriceValue::Price(1.0));
        assert!(store.has_completed_cycle());
    }

    #[test]
    fn test_update_applies_closure() {
        let store = DashboardStore::new(&test_assets());
        let next = store.update(|prev| DashboardState {
            error_count: prev.error_count + 1,
            status: HealthStatus::Error,
            ..prev.clone()
        });
        assert_eq!(next.error_count, 1);
        assert_eq!(store.snapshot().status, HealthStatus::Error);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let assets = test_assets();
        let store = Arc::new(DashboardStore::new(&assets));

        let writer = {
            let store = store.clone();
            let assets = assets.clone();
            thread::spawn(move || {
                for i in 1..=200u32 {
                    store.update(|prev| DashboardState {
                        prices: PriceSnapshot::filled(&assets, PriceValue::Price(i as f64)),
                        error_count: i,
                        ..prev.clone()
                    });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let state = store.snapshot();
                        let expected = match state.error_count {
                            0 => PriceValue::Loading,
                            n => PriceValue::Price(n as f64),
                        };
                        for (_, value) in state.prices.iter() {
                            assert_eq!(*value, expected);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.snapshot().error_count, 200);
    }
}
