use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (`[retry]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// First backoff wait in milliseconds.
    pub initial_interval_ms: u64,
    /// Growth factor applied per failed attempt. Must be >= 1.0.
    pub multiplier: f64,
    /// Upper bound on the backoff wait in milliseconds.
    pub max_interval_ms: u64,
    /// Safety ceiling on attempts per execution, including the first.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1000,
            multiplier: 2.0,
            max_interval_ms: 30_000,
            max_attempts: 10,
        }
    }
}

/// Database connection parameters (`[influx]` section), passed through to
/// the query client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL of the InfluxDB 3 server.
    pub url: String,
    /// Bearer token; omit for servers without auth.
    #[serde(default)]
    pub token: Option<String>,
    /// Database (bucket) queries run against.
    pub database: String,
    /// Socket read timeout in milliseconds.
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8181".to_string(),
            token: None,
            database: "mydb".to_string(),
            read_timeout_ms: 90_000,
            write_timeout_ms: 90_000,
        }
    }
}

/// HTTP front-end parameters (`[server]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:8080".
    pub bind: String,
    /// Worker threads accepting requests.
    pub workers: usize,
    /// Shutdown mode label, logged when /shutdown is hit.
    pub shutdown: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            workers: 4,
            shutdown: "graceful".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/fluxgate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FluxgateConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fluxgate")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FluxgateConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FluxgateConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path (e.g. `--config` override).
pub fn load_from(path: &Path) -> Result<FluxgateConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: FluxgateConfig = toml::from_str(&data)?;
    Ok(cfg)
}
