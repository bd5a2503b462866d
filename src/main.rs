use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use job_scheduler::{
    config::Config,
    database::Database,
    scheduling::{LoggingJobRunner, SchedulingCoordinator, TriggerEngine},
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "job-scheduler")]
#[command(version = "0.1.0")]
#[command(about = "A durable job scheduling service")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("job_scheduler={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Scheduler v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let timezone: chrono_tz::Tz = config
        .scheduler
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", config.scheduler.timezone, e))?;
    let engine = TriggerEngine::new(timezone, config.scheduler.run_missed_immediately);

    let coordinator =
        SchedulingCoordinator::new(database.clone(), engine, Arc::new(LoggingJobRunner));

    // Restore the registry from the store before accepting operations
    let armed = coordinator.reconcile().await?;
    info!("Startup reconciliation armed {} jobs", armed);

    let web_server = WebServer::new(&config, coordinator, database)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
