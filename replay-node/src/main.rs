use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use replay_node::config::{LogFormat, ReplayConfig};
use replay_node::server::{initialize_metrics, serve, start_metrics_exporter, AppState};
use replay_node::{EventCatalog, TransportSettings};

/// Configuration path used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default";

fn init_tracing(config: &ReplayConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Logging depends on the configuration, so report load failures after init
    let loaded = ReplayConfig::from_file(&config_path);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ReplayConfig::default(),
    };
    init_tracing(&config);

    info!(
        "Starting Replay Node v{} - paced dataset replay",
        env!("CARGO_PKG_VERSION")
    );
    match loaded {
        Ok(_) => info!(path = %config_path, "Configuration loaded"),
        Err(e) => warn!(path = %config_path, error = %e, "Failed to load config file, using defaults"),
    }

    config.validate().context("Invalid configuration")?;
    if config.server.debug {
        debug!("Effective configuration:\n{}", config.to_toml()?);
    }

    // Scoring runs once, before any connection is accepted
    let catalog = EventCatalog::prepare(&config).context("Failed to prepare replay sequence")?;

    let runtime = build_runtime(&config).context("Failed to build async runtime")?;

    info!(threaded = config.server.threaded, "Runtime ready");
    runtime.block_on(run(config, catalog))
}

/// Multi-threaded unless the configuration asks for a single-threaded server
fn build_runtime(config: &ReplayConfig) -> std::io::Result<tokio::runtime::Runtime> {
    if !config.server.threaded {
        return tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build();
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if config.server.worker_threads > 0 {
        builder.worker_threads(config.server.worker_threads);
    }
    builder.enable_all().build()
}

async fn run(config: ReplayConfig, catalog: EventCatalog) -> Result<()> {
    initialize_metrics();
    if config.metrics.enabled {
        start_metrics_exporter(config.metrics_addr()?)?;
    }

    let listen_addr = config.listen_addr()?;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {listen_addr}"))?;

    let state = AppState::new(catalog, TransportSettings::from(&config.stream));
    serve(listener, state).await
}
