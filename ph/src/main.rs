//! PrimeHack - distributed Lucas-Lehmer worker
//!
//! CLI entry point for running a worker and for local checks.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use primehack::check::lucas_lehmer;
use primehack::chunker::MAX_EXPONENT;
use primehack::cli::{Cli, Command, OutputFormat};
use primehack::codec;
use primehack::config::Config;
use primehack::engine::{NativeEngine, ResidueEngine, Verdict, mersenne};
use primehack::events::{EventBus, EventLogEntry, WorkerEvent};
use primehack::transport::{HttpTransport, TransportClient};
use primehack::worker::{HistoryEntry, WorkMode, WorkerHandle, WorkerLoop};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("primehack")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("primehack.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            mode,
            max_chunks,
            source,
            format,
        } => {
            if let Some(mode) = mode {
                config.worker.mode = mode;
            }
            if max_chunks.is_some() {
                config.worker.max_chunks = max_chunks;
            }
            if let Some(source) = source {
                config.source.base_url = source;
            }
            config.validate()?;
            cmd_run(&config, format).await
        }
        Command::Check { p, chunk_size, format } => {
            if let Some(size) = chunk_size {
                config.check.chunk_size = size;
            }
            config.validate()?;
            cmd_check(&config, p, format)
        }
        Command::Prime { n } => cmd_prime(&n),
        Command::Mersenne { p, digits } => cmd_mersenne(p, digits),
        Command::Primes { source, format } => {
            if let Some(source) = source {
                config.source.base_url = source;
            }
            config.validate()?;
            cmd_primes(&config, format).await
        }
    }
}

/// Run the worker loop until Ctrl-C, the chunk budget, or a fault
async fn cmd_run(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(base_url = %config.source.base_url, mode = %config.worker.mode, "cmd_run: called");
    let worker_id = uuid::Uuid::now_v7().to_string();
    let transport = HttpTransport::from_config(&config.source, worker_id.clone()).context("Failed to build HTTP client")?;
    let engine: Arc<dyn ResidueEngine> = Arc::new(NativeEngine::new());
    let bus = EventBus::with_default_capacity();

    let mut worker = WorkerLoop::with_id(worker_id.clone(), Arc::new(transport), engine, config.worker.clone()).with_events(&bus);

    let printer = tokio::spawn(print_events(bus.subscribe(), format));
    tokio::spawn(stop_on_signal(worker.handle()));

    if format == OutputFormat::Text {
        println!(
            "{} Worker {} ({} mode) against {}",
            "▶".green(),
            worker_id.cyan(),
            config.worker.mode,
            config.source.base_url
        );
    }

    let outcome = worker.run().await;
    if let Err(e) = printer.await {
        warn!("Event printer ended abnormally: {}", e);
    }

    if format == OutputFormat::Text {
        print_history(&worker, config.worker.mode);
    }
    outcome.map_err(|e| eyre::eyre!("Worker halted: {}", e))
}

/// Request a cooperative stop on SIGINT or SIGTERM
async fn stop_on_signal(handle: WorkerHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            warn!("Failed to install SIGTERM handler");
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => debug!("stop_on_signal: SIGINT received"),
            _ = sigterm.recv() => debug!("stop_on_signal: SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
    }
    info!("Stop requested, finishing current iteration");
    eprintln!("{}", "Stopping after the current iteration...".yellow());
    handle.stop();
}

/// Print worker events until the loop ends
async fn print_events(mut rx: tokio::sync::broadcast::Receiver<WorkerEvent>, format: OutputFormat) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                debug!(missed, "print_events: lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let terminal = event.is_terminal();

        match format {
            OutputFormat::Json => match serde_json::to_string(&EventLogEntry::now(event)) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            },
            OutputFormat::Text => print_event_text(&event),
        }

        if terminal {
            break;
        }
    }
}

fn print_event_text(event: &WorkerEvent) {
    match event {
        WorkerEvent::ChunkSubmitted {
            prime_exponent,
            start_iter,
            end_iter,
            res64,
            duration_ms,
            ..
        } => println!(
            "  M{} [{}, {}) res64={} {}",
            prime_exponent,
            start_iter,
            end_iter,
            res64.yellow(),
            format!("{}ms", duration_ms).dimmed()
        ),
        WorkerEvent::ExponentCompleted {
            prime_exponent,
            is_prime,
            ..
        } => {
            if *is_prime {
                println!("{} M{} is prime", "★".green().bold(), prime_exponent);
            } else {
                println!("  M{} is {}", prime_exponent, "composite".dimmed());
            }
        }
        WorkerEvent::RangeScanned {
            start,
            end,
            primes_found,
            ..
        } => println!("  scanned {}..={} ({} primes)", start, end, primes_found),
        WorkerEvent::ChunkAbandoned { kind, reason, .. } => {
            println!("{} abandoned ({}): {}", "!".yellow(), kind, reason)
        }
        WorkerEvent::Faulted { message, .. } => println!("{} {}", "✗ fault:".red().bold(), message),
        WorkerEvent::Stopped { chunks_submitted, .. } => {
            println!("{} stopped after {} submissions", "■".cyan(), chunks_submitted)
        }
        WorkerEvent::Started { .. } | WorkerEvent::StatusChanged { .. } | WorkerEvent::ChunkClaimed { .. } => {}
    }
}

fn print_history(worker: &WorkerLoop, mode: WorkMode) {
    let session = worker.session();
    println!("{} {}", "Last status:".bold(), session.status());
    let found: Vec<String> = session
        .history()
        .filter_map(|entry| match entry {
            HistoryEntry::Verdict {
                prime_exponent,
                is_prime: true,
            } => Some(format!("M{}", prime_exponent)),
            HistoryEntry::Prime { numeral } if mode == WorkMode::RangeScan => Some(numeral.clone()),
            _ => None,
        })
        .collect();
    if !found.is_empty() {
        println!("{} {}", "Primes this session:".bold(), found.join(", ").green());
    }
}

/// Test 2^p - 1 locally
fn cmd_check(config: &Config, p: u64, format: OutputFormat) -> Result<()> {
    debug!(p, chunk_size = config.check.chunk_size, "cmd_check: called");
    let engine = NativeEngine::new();
    let report = lucas_lehmer(&engine, p, config.check.chunk_size, |chunk| {
        info!(
            "M{}: {} / {} iterations",
            p,
            chunk.end_iter(),
            chunk.exponent().total_iterations()
        );
    })
    .map_err(|e| eyre::eyre!("Check of M{} failed: {}", p, e))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Text => {
            if report.is_prime {
                println!("{} M{} is prime", "✓".green(), p);
            } else {
                println!("{} M{} is composite (res64 {})", "✗".red(), p, report.res64);
            }
        }
    }
    Ok(())
}

/// Routed primality check of a decimal integer
fn cmd_prime(n: &str) -> Result<()> {
    debug!(len = n.len(), "cmd_prime: called");
    let value = codec::decode(n).context("Invalid integer")?;
    let verdict = NativeEngine::new().classify(&value);
    let shown = match verdict {
        Verdict::Prime => verdict.to_string().green(),
        Verdict::ProbablePrime => verdict.to_string().yellow(),
        Verdict::Composite => verdict.to_string().red(),
    };
    println!("{} is {}", n, shown);
    Ok(())
}

fn cmd_mersenne(p: u64, digits: bool) -> Result<()> {
    debug!(p, digits, "cmd_mersenne: called");
    if p > MAX_EXPONENT {
        return Err(eyre::eyre!("Exponent {} is above the supported maximum of {}", p, MAX_EXPONENT));
    }
    let value = mersenne(p);
    let text = codec::encode(&value);
    if digits {
        println!("{}", text.len());
    } else {
        println!("{}", text);
    }
    Ok(())
}

/// List primes the source has recorded
async fn cmd_primes(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(base_url = %config.source.base_url, "cmd_primes: called");
    let transport = HttpTransport::from_config(&config.source, uuid::Uuid::now_v7().to_string())
        .context("Failed to build HTTP client")?;
    let primes = transport.list_primes().await.context("Failed to list primes")?;

    match format {
        OutputFormat::Json => {
            let numerals: Vec<String> = primes.iter().map(codec::encode).collect();
            println!("{}", serde_json::json!({ "primes": numerals }));
        }
        OutputFormat::Text => {
            if primes.is_empty() {
                println!("{}", "No primes recorded yet".dimmed());
            }
            for prime in &primes {
                let text = codec::encode(prime);
                if text.len() > 60 {
                    println!("{}... ({} digits)", &text[..30], text.len());
                } else {
                    println!("{}", text);
                }
            }
        }
    }
    Ok(())
}
