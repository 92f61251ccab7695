use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use quarry_core::config::AppConfig;
use quarry_core::http_client::{HttpClient, ReqwestHttpClient};
use quarry_core::scrapers::{Scraper, StockScraper, WeatherScraper};
use quarry_warehouse::Warehouse;

use quarry_daemon::cli::Cli;
use quarry_daemon::logging;
use quarry_daemon::pipeline::Pipeline;
use quarry_daemon::scheduler::Scheduler;

// Exit codes: 0 clean shutdown, 1 runtime failure, 2 configuration error.
const EXIT_RUNTIME: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let _log_guard = logging::init(&config.logging);
    info!(config_path = %cli.config.display(), "quarry starting");

    let warehouse = match Warehouse::connect(&config.database).await {
        Ok(warehouse) => warehouse,
        Err(e) => {
            error!(error = %e, "CRITICAL: cannot reach the database");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };
    if let Err(e) = warehouse.init_schema().await {
        error!(error = %e, "CRITICAL: schema initialization failed");
        return ExitCode::from(EXIT_RUNTIME);
    }

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::default());
    let stock = match StockScraper::new(config.stock_scraper.clone(), Arc::clone(&client)) {
        Ok(scraper) => scraper,
        Err(e) => {
            error!(error = %e, "invalid stock scraper configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let weather = match WeatherScraper::new(config.weather_scraper.clone(), Arc::clone(&client)) {
        Ok(scraper) => scraper,
        Err(e) => {
            error!(error = %e, "invalid weather scraper configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let scrapers: Vec<Arc<dyn Scraper>> = vec![Arc::new(stock), Arc::new(weather)];

    let pipeline = Arc::new(Pipeline::new(Arc::new(warehouse)));
    let scheduler = Arc::new(Scheduler::new(pipeline, scrapers));

    if cli.once {
        scheduler.run_once().await;
        info!("single pass finished");
        return ExitCode::SUCCESS;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "CRITICAL: cannot listen for shutdown signal");
        return ExitCode::from(EXIT_RUNTIME);
    }
    info!("shutdown signal received, finishing in-flight cycles");
    let _ = shutdown_tx.send(true);
    let _ = runner.await;

    info!("quarry stopped");
    ExitCode::SUCCESS
}
