//! Duck Hunt Server
//!
//! Loads the configuration, opens storage and runs one runner per network
//! plus the engine ticker until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use duckhunt::{
    config::{GameConfig, NetworkConfig, StorageBackend},
    core::{GameRng, SystemClock},
    game::LevelTable,
    messaging::OutboundRouter,
    network::{run_ticker, ConsoleTransport, NetworkRunner},
    persistence::{JsonSnapshotStore, Persistence, TableStore},
    GameEngine, VERSION,
};

/// Network played from the console when none is configured.
const CONSOLE_NETWORK: &str = "console";

#[cfg(feature = "debug-tracing")]
const DEFAULT_FILTER: &str = "duckhunt=debug,info";
#[cfg(not(feature = "debug-tracing"))]
const DEFAULT_FILTER: &str = "info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Duck Hunt Server v{}", VERSION);

    let path = GameConfig::resolve_path(std::env::args().nth(1));
    let mut config = GameConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if config.networks.is_empty() {
        config.networks.insert(
            CONSOLE_NETWORK.to_string(),
            NetworkConfig {
                channels: vec!["#ducks".to_string()],
                ..NetworkConfig::default()
            },
        );
    }

    let store: Arc<dyn Persistence> = match config.storage.backend {
        StorageBackend::Snapshot => Arc::new(
            JsonSnapshotStore::open(&config.storage.path, LevelTable::default())
                .with_context(|| format!("opening {}", config.storage.path.display()))?,
        ),
        StorageBackend::Table => Arc::new(
            TableStore::open(&config.storage.path, LevelTable::default())
                .with_context(|| format!("opening {}", config.storage.path.display()))?,
        ),
    };
    info!(backend = ?config.storage.backend, "storage ready");

    let tick_period = Duration::from_millis(config.tick_interval_ms);
    let networks: Vec<(String, Vec<String>)> = config
        .networks
        .iter()
        .map(|(name, network)| (name.clone(), network.channels.clone()))
        .collect();

    let router = Arc::new(OutboundRouter::new());
    let engine = Arc::new(GameEngine::new(
        config,
        store,
        router.clone(),
        Arc::new(SystemClock),
        Box::new(GameRng::from_entropy()),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(run_ticker(engine.clone(), tick_period, shutdown_tx.subscribe())));

    // A terminal has one stdin, so only the first network is played from it.
    let mut networks = networks.into_iter();
    if let Some((name, channels)) = networks.next() {
        info!(network = %name, ?channels, "starting console runner");
        let runner = NetworkRunner::new(
            &name,
            channels,
            engine.clone(),
            ConsoleTransport::new(),
            router.attach(&name),
            shutdown_tx.subscribe(),
        );
        tasks.push(tokio::spawn(runner.run()));
    }
    for (name, _) in networks {
        warn!(network = %name, "no transport available, network skipped");
    }

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutting down");
    let _ = shutdown_tx.send(());
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "task ended abnormally");
        }
    }
    Ok(())
}
