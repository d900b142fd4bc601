use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taxi_web::{TaxiServer, WebConfig};

#[derive(Parser, Debug)]
#[command(name = "taxi-web")]
#[command(about = "Taxi service web console", version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TAXI_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Create a driver before serving
    #[arg(long, value_name = "USERNAME:LICENSE:PASSWORD")]
    create_driver: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(taxi_common::default_config_path);
    let mut cfg = WebConfig::load(&config_path)?;
    cfg.apply_env()?;
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }
    cfg.validate()?;

    info!(
        "Starting taxi service v{} (db: {})",
        taxi_common::VERSION,
        cfg.db_path.display()
    );

    let addr = cfg.listen.parse()?;
    let server = TaxiServer::new(cfg)?;
    if let Some(triple) = cli.create_driver.as_deref() {
        server.create_driver(triple)?;
    }
    server.serve(addr).await
}
