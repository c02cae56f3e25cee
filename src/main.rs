//! Cache Registry demo
//!
//! Runs a synthetic layer-lookup workload against a registry so its
//! background sweep, pressure monitor and statistics can be observed in the logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_registry::{CacheRegistry, Config, LruCache};

const WORKERS: usize = 4;
const ROUNDS: u64 = 20;
const DISTINCT_LAYERS: u64 = 64;

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the registry (starts the memory pressure monitor)
/// 4. Run the workload, logging statistics after every round
/// 5. Shut down on Ctrl+C/SIGTERM or when the rounds are done
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_registry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache registry demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_max_size={}, default_ttl={:?}, max_memory={} bytes",
        config.default_max_size, config.default_ttl, config.max_memory_bytes
    );

    let registry = Arc::new(CacheRegistry::new(config).context("invalid cache configuration")?);
    let layers = registry
        .get_or_create::<String, u64>("LayerCache", 32, Duration::from_secs(5))
        .context("failed to create LayerCache")?;

    tokio::select! {
        result = run_workload(Arc::clone(&registry), layers) => result?,
        _ = shutdown_signal() => {}
    }

    registry.shutdown();
    info!("Demo shutdown complete");
    Ok(())
}

async fn run_workload(registry: Arc<CacheRegistry>, layers: Arc<LruCache<String, u64>>) -> anyhow::Result<()> {
    for round in 0..ROUNDS {
        let mut workers = JoinSet::new();
        for worker in 0..WORKERS as u64 {
            let layers = Arc::clone(&layers);
            workers.spawn(async move {
                for i in 0..50u64 {
                    let name = format!("Layer-{}", (i * 7 + worker + round) % DISTINCT_LAYERS);
                    layers
                        .get_or_add_async(name, resolve_layer)
                        .await
                        .map_err(|e| anyhow::anyhow!(e))?;
                }
                Ok::<_, anyhow::Error>(())
            });
        }
        while let Some(joined) = workers.join_next().await {
            joined.context("worker panicked")??;
        }

        let stats = registry.statistics();
        info!("Round {}: {}", round, serde_json::to_string(&stats)?);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

/// Stand-in for an expensive lookup against the host application.
async fn resolve_layer(name: String) -> Result<u64, String> {
    tokio::time::sleep(Duration::from_millis(2)).await;
    name.rsplit('-')
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .map(|n| 0x1000 + n)
        .ok_or_else(|| format!("unknown layer {}", name))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
