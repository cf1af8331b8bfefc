//! TaskSource entry point

use clap::Parser;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tasksource::cli::Cli;
use tasksource::{AppState, Config, Ledger, serve};

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    let level = cli
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level);
    config.validate()?;

    info!(
        "Testing exponents from {} (chunk size {}, lease timeout {}s)",
        config.ledger.first_exponent, config.ledger.chunk_size, config.ledger.lease_timeout_secs
    );
    let listener = TcpListener::bind(&config.listen)
        .await
        .context(format!("Failed to bind {}", config.listen))?;
    let state = AppState::new(Ledger::new(config.ledger.clone()));

    serve(listener, state, shutdown_signal()).await.context("Server error")?;
    info!("Task source stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
