//! Campaign export server
//!
//! Hosts the export pipeline behind the HTTP API consumed by the outreach
//! application UI.

mod http_api;

use actix_web::{web, App, HttpServer};
use clap::{Arg, Command};
use export_core::{
    ClipboardDestination, CsvFileDestination, ExportConfig, ExportOrchestrator,
    ExportRepository, InstantlyDestination, SmartleadDestination,
};
use http_api::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("export-server")
        .version("1.0.0")
        .about("Campaign export pipeline server")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("./credentials.json"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory for export records")
                .default_value("./data/exports"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("ADDR")
                .help("Bind address")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .help("Bind port")
                .default_value("8085"),
        )
        .arg(
            Arg::new("check-connections")
                .long("check-connections")
                .help("Probe the remote destinations at startup")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").unwrap();
    let config = ExportConfig::from_file(config_path)?;
    log::info!("Loaded configuration from {}", config_path);

    // Initialize the export record store
    let data_dir = matches.get_one::<String>("data-dir").unwrap();
    let repository = Arc::new(ExportRepository::new(data_dir)?);
    log::info!("Using data directory: {}", data_dir);

    // Build one adapter per destination
    let instantly = Arc::new(InstantlyDestination::new(
        config.instantly.clone(),
        config.export.clone(),
    ));
    let smartlead = Arc::new(SmartleadDestination::new(
        config.smartlead.clone(),
        config.export.clone(),
    ));

    if matches.get_flag("check-connections") {
        match instantly.test_connection().await {
            Ok(true) => log::info!("Instantly connection OK"),
            Ok(false) => log::warn!("Instantly connection check failed"),
            Err(e) => log::warn!("Instantly connection check errored: {}", e),
        }
        match smartlead.test_connection().await {
            Ok(true) => log::info!("Smartlead connection OK"),
            Ok(false) => log::warn!("Smartlead connection check failed"),
            Err(e) => log::warn!("Smartlead connection check errored: {}", e),
        }
    }

    let state = web::Data::new(AppState {
        repository: repository.clone(),
        orchestrator: Arc::new(ExportOrchestrator::new(repository)),
        instantly,
        smartlead,
        csv_file: Arc::new(CsvFileDestination::new()),
        clipboard: Arc::new(ClipboardDestination::new()),
    });

    let host = matches.get_one::<String>("host").unwrap().clone();
    let port: u16 = matches
        .get_one::<String>("port")
        .unwrap()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid port"))?;

    log::info!("Starting export server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(http_api::init_app)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}
