//! Playback coordinator (totem-pc) - Main entry point
//!
//! Plays one location through the simulated engine and prints every GUI
//! signal as a JSON line. Useful for watching the coordinator's state
//! machine without a real media framework.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use totem_common::human_time::format_stream_length;
use totem_common::PlayerSignal;
use totem_pc::engine::{Credentials, MediaSource, SimulatedEngine};
use totem_pc::service::StaticCredentials;
use totem_pc::{CoordinatorConfig, CoordinatorService, PlaybackController};

/// Command-line arguments for totem-pc
#[derive(Parser, Debug)]
#[command(name = "totem-pc")]
#[command(about = "Playback coordinator driving a simulated pipeline engine")]
#[command(version)]
struct Args {
    /// Location to play (file:// path, http(s)://, rtsp://, dvd://)
    uri: String,

    /// Configuration file
    #[arg(short, long, env = "TOTEM_PC_CONFIG")]
    config: Option<PathBuf>,

    /// Duration reported by the simulated engine, in milliseconds
    #[arg(long, default_value = "5000")]
    duration_ms: u64,

    /// Seek to this position (ms) once playback starts
    #[arg(long)]
    seek_ms: Option<i64>,

    /// Username offered when a source asks for credentials
    #[arg(long, env = "TOTEM_PC_USER", requires = "password")]
    user: Option<String>,

    /// Password offered when a source asks for credentials
    #[arg(long, env = "TOTEM_PC_PASSWORD", requires = "user")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = CoordinatorConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config).context("Failed to initialize logging")?;

    info!("Starting totem-pc for {}", args.uri);

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let engine = SimulatedEngine::new(engine_tx).with_duration(args.duration_ms);
    let controller = PlaybackController::new(Box::new(engine), config);

    let (mut service, handle) = CoordinatorService::new(controller, engine_rx);
    if let (Some(username), Some(password)) = (args.user, args.password) {
        service = service.with_credential_provider(Arc::new(StaticCredentials(Credentials {
            username,
            password,
        })));
    }
    let mut signals = handle.subscribe();
    let service_task = tokio::spawn(service.run());

    handle
        .open(MediaSource::new(args.uri.clone()))
        .await
        .context("Failed to open location")?;
    handle.play().await.context("Failed to start playback")?;

    let mut pending_seek = args.seek_ms;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = signals.recv() => {
                let signal = match signal {
                    Ok(signal) => signal,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Signal receiver lagged, skipped {} signals", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                println!("{}", serde_json::to_string(&signal).context("Failed to encode signal")?);

                match signal {
                    PlayerSignal::PlayStarting => {
                        if let Some(time_ms) = pending_seek.take() {
                            handle.seek(time_ms, false).await.context("Failed to seek")?;
                        }
                    }
                    PlayerSignal::EndOfStream => {
                        info!("Playback finished");
                        break;
                    }
                    PlayerSignal::Error { is_fatal: true, ref message, .. } => {
                        warn!("Playback failed: {}", message);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut shutdown => break,
        }
    }

    if let Ok(snapshot) = handle.snapshot().await {
        info!(
            "Final state: target {:?}, engine {}, length {}",
            snapshot.target,
            snapshot.actual,
            format_stream_length(Some(snapshot.stream_length_ms))
        );
    }

    handle.shutdown().await.context("Coordinator already stopped")?;
    service_task.await.context("Coordinator task failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Console logging plus an optional log file
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(config: &CoordinatorConfig) -> Result<()> {
    let default_filter = format!("totem_pc={}", config.logging.level);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.clone().into())
    };

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
