use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReplayError, Result};

/// Environment variable prefix, e.g. `FLOWGUARD__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "FLOWGUARD";

/// Main configuration for the replay node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Dataset location and preparation
    pub dataset: DatasetConfig,
    /// Model artifact location
    pub model: ModelConfig,
    /// Push stream pacing and buffering
    pub stream: StreamConfig,
    /// Metrics and monitoring
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (0.0.0.0 for all interfaces)
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// Verbose logging
    pub debug: bool,
    /// Serve connections on a multi-threaded runtime
    pub threaded: bool,
    /// Worker thread count when threaded (0 = one per core)
    pub worker_threads: usize,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the labeled CSV file
    pub path: PathBuf,
    /// Name of the ground-truth column
    pub label_column: String,
    /// Label value that marks benign traffic; any other value is an attack
    pub benign_marker: String,
    /// Shuffle rows once at startup
    pub shuffle: bool,
    /// Seed for the startup shuffle
    pub shuffle_seed: u64,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the JSON model artifact
    pub path: PathBuf,
}

/// Push stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between consecutive events of one session (milliseconds)
    pub pacing_interval_ms: u64,
    /// Events buffered per session before new ones are dropped
    pub channel_capacity: usize,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus exporter
    pub enabled: bool,
    /// Exporter listen address
    pub listen_addr: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5050,
            debug: false,
            threaded: true,
            worker_threads: 0,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Dataset/web_attacks_balanced_Random_Forest.csv"),
            label_column: "Label".to_string(),
            benign_marker: "BENIGN".to_string(),
            shuffle: true,
            shuffle_seed: 42,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Model/lstm_model.json"),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pacing_interval_ms: 1000,
            channel_capacity: 64,
        }
    }
}

impl StreamConfig {
    /// Get pacing interval as Duration
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:9091".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
        }
    }
}

impl ReplayConfig {
    /// Load configuration: defaults, then the optional file, then environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&ReplayConfig::default())?)
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Render the effective configuration (logged in debug mode)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReplayError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ReplayError::Config("Server port cannot be 0".to_string()));
        }

        if self.stream.pacing_interval_ms == 0 {
            return Err(ReplayError::Config(
                "Pacing interval must be at least 1 ms".to_string(),
            ));
        }

        if self.stream.channel_capacity == 0 {
            return Err(ReplayError::Config(
                "Stream channel capacity cannot be 0".to_string(),
            ));
        }

        self.listen_addr()?;
        if self.metrics.enabled {
            self.metrics_addr()?;
        }

        Ok(())
    }

    /// Get listen address from server config
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|e| ReplayError::Config(format!("Invalid bind address: {e}")))
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.metrics
            .listen_addr
            .parse()
            .map_err(|e| ReplayError::Config(format!("Invalid metrics address: {e}")))
    }

    /// Default log filter for the configured verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.server.debug {
            "replay_node=debug,tower_http=debug"
        } else {
            "replay_node=info"
        }
    }
}
