//! Resilink - keeps a TCP connection to a configured target alive.
//!
//! Connects through a `ResilienceController`, retrying with the configured
//! backoff until the target answers, retries run out, or the process is
//! asked to stop.

mod config;
mod connector;
mod observer;

use std::future::pending;
use std::pin::pin;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use config::{env::get_config_path, load_and_validate};
use connector::connect_tcp;
use observer::ReconnectObserver;
use resilink::{ConnectOutcome, ConnectionState, ResilienceController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Resilink v{} starting...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = get_config_path();
    info!("Loading configuration from {}...", config_path);

    let config = load_and_validate(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        error!("Please ensure {} exists and is properly formatted.", config_path);
        e
    })?;
    let reconnect = config.reconnect_config()?;

    info!("Configuration loaded successfully");
    info!("  Target: {}", config.target_addr());
    info!("  Connect timeout: {} ms", config.connect_timeout().as_millis());
    info!("  Strategy: {}", reconnect.strategy);
    info!("  Max retries: {}", reconnect.max_retries);

    let controller = ResilienceController::new(reconnect);
    let observer = ReconnectObserver::new();
    observer.attach(&controller);

    let host = config.target.host.as_str();
    let port = config.target.port;
    let connect_timeout = config.connect_timeout();

    let mut cycle = pin!(controller.connect(|| connect_tcp(host, port, connect_timeout)));

    // Stop retrying on shutdown, then let the cycle settle
    let outcome = tokio::select! {
        biased;
        outcome = &mut cycle => outcome,
        _ = shutdown_signal() => {
            info!("Shutdown signal received - stopping reconnection...");
            controller.stop_reconnect();
            cycle.await
        }
    };

    match outcome {
        ConnectOutcome::Connected(stream) => match stream.peer_addr() {
            Ok(addr) => info!("Connection established with {}", addr),
            Err(e) => warn!("Connected, but peer address is unavailable: {}", e),
        },
        ConnectOutcome::Failed => error!("Could not connect to {}", config.target_addr()),
        ConnectOutcome::Aborted => info!("Connection attempt aborted"),
    }

    let report = serde_json::json!({
        "stats": controller.stats(),
        "events": observer.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = controller.state() == ConnectionState::Failed;
    controller.destroy();

    if failed {
        std::process::exit(1);
    }

    info!("Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
