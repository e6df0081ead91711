use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::parse::parse_snapshot;
use super::retry::RetryPolicy;
use super::transport::Transport;
use crate::error::FetchError;
use shared::{Asset, PriceSnapshot};

/// Anything that can produce a current snapshot. Implementations never fail:
/// problems show up as unavailable entries.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_snapshot(&self) -> PriceSnapshot;
}

pub struct PriceApiClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
    assets: Vec<Asset>,
    currencies: Vec<String>,
    policy: RetryPolicy,
}

impl PriceApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        assets: Vec<Asset>,
        currencies: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        PriceApiClient {
            transport,
            endpoint: endpoint.into(),
            assets,
            currencies,
            policy,
        }
    }

    fn quote_currency(&self) -> &str {
        self.currencies.first().map(String::as_str).unwrap_or("usd")
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let ids: Vec<&str> = self.assets.iter().map(|a| a.id.as_str()).collect();
        vec![
            ("ids", ids.join(",")),
            ("vs_currencies", self.currencies.join(",")),
        ]
    }

    /// Transport-level loop: waits out 429s, backs off on network failures,
    /// and hands back the body of the first 200.
    async fn fetch_body(&self) -> Result<String, FetchError> {
        let query = self.query();
        let mut attempt: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            match self.transport.get(&self.endpoint, &query).await {
                Ok(resp) if resp.status == 200 => return Ok(resp.body),
                Ok(resp) if resp.status == 429 => {
                    if rate_limit_waits >= self.policy.max_rate_limit_waits {
                        return Err(FetchError::RateLimited(rate_limit_waits));
                    }
                    rate_limit_waits += 1;
                    let wait = self.policy.rate_limit_wait(resp.retry_after.as_deref());
                    warn!(
                        "Rate limited by price API (Retry-After: {:?}), waiting {}s",
                        resp.retry_after,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
                Ok(resp) => {
                    if !resp.body.is_empty() {
                        debug!("Error response: {}", resp.body);
                    }
                    return Err(FetchError::Status(resp.status));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        return Err(FetchError::RetriesExhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    let delay = self.policy.delay_for_attempt(attempt - 1);
                    warn!(
                        "Price API request failed (attempt {}/{}): {}; retrying in {}ms",
                        attempt,
                        self.policy.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl PriceSource for PriceApiClient {
    async fn fetch_snapshot(&self) -> PriceSnapshot {
        let body = match self.fetch_body().await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to fetch prices: {}", e);
                return PriceSnapshot::unavailable(&self.assets);
            }
        };

        match parse_snapshot(&body, &self.assets, self.quote_currency()) {
            Ok(snapshot) => {
                let missing = snapshot.missing();
                if missing.is_empty() {
                    let summary: Vec<String> = snapshot
                        .iter()
                        .map(|(asset, value)| format!("{}={}", asset.symbol, value))
                        .collect();
                    info!("Fetched prices: {}", summary.join(", "));
                } else {
                    let symbols: Vec<&str> = missing.iter().map(|a| a.symbol.as_str()).collect();
                    warn!("Price API response missing: {}", symbols.join(", "));
                }
                snapshot
            }
            Err(e) => {
                error!("Failed to parse price API response: {}", e);
                PriceSnapshot::unavailable(&self.assets)
            }
        }
    }
}
