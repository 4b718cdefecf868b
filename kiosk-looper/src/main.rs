//! Kiosk Looper (kiosk-looper) - Main entry point
//!
//! Loops video content chosen by a rotary selector and a mode switch, with
//! transition clips between content sets.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kiosk_common::config::{resolve_config_path, KioskConfig, PlayerKind};
use kiosk_looper::player::create_player;
use kiosk_looper::runner::{spawn_event_logger, Looper};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for kiosk-looper
#[derive(Parser, Debug)]
#[command(name = "kiosk-looper")]
#[command(about = "Position and mode driven video looper")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device of the selector microcontroller
    #[arg(short, long, env = "KIOSK_SERIAL_DEVICE")]
    serial_device: Option<PathBuf>,

    /// Where to persist the selector position
    #[arg(long, env = "KIOSK_STATE_PATH")]
    state_path: Option<PathBuf>,

    /// Use the dummy player instead of launching a decoder
    #[arg(long)]
    dummy_player: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = KioskConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "kiosk_looper={level},kiosk_common={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting kiosk-looper v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Configuration: {}", config_path.display());

    if let Some(device) = args.serial_device {
        config.serial.device = Some(device);
    }
    if let Some(state_path) = args.state_path {
        config.looper.state_path = state_path;
    }
    if args.dummy_player {
        config.player.kind = PlayerKind::Dummy;
    }

    let player = create_player(&config.player);
    let looper = Looper::from_config(&config, player).context("Failed to start looper")?;
    let _event_logger = spawn_event_logger(looper.events());

    looper.run(shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
