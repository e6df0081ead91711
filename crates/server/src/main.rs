// Crypto dashboard server
// Wires the refresh pipeline (price API -> history -> chart -> store) to the HTTP front end

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::sync::Arc;

// Module declarations
mod api;
mod chart;
mod config;
mod coordinator;
mod error;
mod handlers;
mod history;
mod scheduler;
mod store;
mod types;

use api::{PriceApiClient, ReqwestTransport};
use chart::SvgChartSink;
use config::ServerConfig;
use coordinator::RefreshCoordinator;
use handlers::{get_chart, get_prices, health_check, index};
use scheduler::Scheduler;
use store::DashboardStore;
use types::AppState;

fn to_io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = ServerConfig::load().map_err(|e| {
        eprintln!("Failed to load server configuration: {}", e);
        to_io_error(e)
    })?;

    // Setup logging
    config.setup_logging();

    let assets = config.tracked_assets();
    let transport = ReqwestTransport::new(config.request_timeout()).map_err(to_io_error)?;
    let source = Arc::new(PriceApiClient::new(
        Arc::new(transport),
        config.api_url.clone(),
        assets.clone(),
        config.currencies.clone(),
        config.retry_policy(),
    ));
    let chart = Arc::new(SvgChartSink::new(
        config.chart_path.clone(),
        assets.clone(),
        config.quote_currency(),
    ));
    let store = Arc::new(DashboardStore::new(&assets));
    let coordinator = Arc::new(RefreshCoordinator::new(
        source,
        chart,
        store.clone(),
        config.cycle_settings(),
    ));

    let scheduler = Scheduler::start(coordinator, config.update_interval());

    let state = web::Data::new(AppState {
        store,
        scheduler: scheduler.handle(),
        chart_path: config.chart_path.clone(),
        quote_currency: config.quote_currency().to_string(),
    });

    info!("Starting crypto dashboard on http://{}:{}", config.http_host, config.http_port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .service(index)
            .service(get_prices)
            .service(health_check)
            .service(get_chart)
    })
    .bind((config.http_host.as_str(), config.http_port))?
    .run();

    let result = server.await;

    // Server has stopped accepting requests; stop the refresh timer too
    scheduler.shutdown().await;
    info!("Crypto dashboard stopped");
    result
}
