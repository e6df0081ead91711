use actix_web::{get, http::header, web, HttpResponse, Responder};
use log::{info, warn};

use crate::types::{AppState, HealthResponse};
use shared::{DashboardView, HealthStatus, PriceValue};

#[get("/")]
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    // First visit before any data: refresh now rather than show placeholders
    if !data.store.has_completed_cycle() {
        info!("First page load without data, requesting immediate refresh");
        data.scheduler.ensure_initialized().await;
    }

    let view = data.store.view();
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render_page(&view, &data.quote_currency))
}

#[get("/api/prices")]
pub async fn get_prices(data: web::Data<AppState>) -> impl Responder {
    web::Json(data.store.view())
}

#[get("/health")]
pub async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let view = data.store.view();
    web::Json(HealthResponse::from(&view))
}

#[get("/static/chart")]
pub async fn get_chart(data: web::Data<AppState>) -> impl Responder {
    match tokio::fs::read(&data.chart_path).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("image/svg+xml")
            .append_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
            .body(bytes),
        Err(e) => {
            warn!("Chart not available at {}: {}", data.chart_path.display(), e);
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "Chart has not been rendered yet"
            }))
        }
    }
}

fn status_banner(view: &DashboardView) -> Option<String> {
    match view.status {
        HealthStatus::Ok => None,
        HealthStatus::Degraded => Some(format!(
            "Price data may be stale: the price API has failed {} times in a row.",
            view.error_count
        )),
        HealthStatus::Error => Some("The last refresh failed; showing the most recent known prices.".to_string()),
    }
}

/// Placeholders render bare; only real prices carry the currency.
fn format_price(value: &PriceValue, currency: &str) -> String {
    match value {
        PriceValue::Price(p) => match currency.to_lowercase().as_str() {
            "usd" => format!("${}", p),
            "eur" => format!("€{}", p),
            "gbp" => format!("£{}", p),
            other => format!("{} {}", p, other.to_uppercase()),
        },
        placeholder => placeholder.to_string(),
    }
}

pub fn render_page(view: &DashboardView, currency: &str) -> String {
    let banner = status_banner(view)
        .map(|msg| format!(r#"<div class="banner {}">{}</div>"#, view.status, msg))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="300">
<title>Crypto Dashboard</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
.prices {{ display: flex; gap: 2rem; }}
.card {{ border: 1px solid #ddd; border-radius: 8px; padding: 1rem 2rem; }}
.banner {{ padding: 0.5rem 1rem; margin-bottom: 1rem; border-radius: 4px; }}
.banner.degraded {{ background: #fff3cd; }}
.banner.error {{ background: #f8d7da; }}
</style>
</head>
<body>
<h1>Crypto Dashboard</h1>
{banner}
<div class="prices">
<div class="card"><h2>Bitcoin</h2><p id="btc">{btc}</p></div>
<div class="card"><h2>Ethereum</h2><p id="eth">{eth}</p></div>
<div class="card"><h2>Solana</h2><p id="sol">{sol}</p></div>
</div>
<p>Last update: {last_update}</p>
<img src="/static/chart?t={timestamp}" alt="Price history chart">
</body>
</html>
"#,
        banner = banner,
        btc = format_price(&view.btc_price, currency),
        eth = format_price(&view.eth_price, currency),
        sol = format_price(&view.sol_price, currency),
        last_update = view.last_update,
        timestamp = view.timestamp,
    )
}
