pub mod logging;
pub mod types;

// Re-export the data model so dependents can `use shared::PriceSnapshot`
pub use logging::{init_logging, parse_level_filter};
pub use types::{
    Asset, ChartRecord, DashboardView, HealthStatus, PriceHistory, PriceSample, PriceSnapshot,
    PriceValue, LOADING_PLACEHOLDER, NOT_UPDATED_PLACEHOLDER, TIME_FORMAT, UNAVAILABLE_MARKER,
};
