use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveConfig {
    #[serde(default)]
    pub live: LiveChannelConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Live-update channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LiveChannelConfig {
    #[serde(default = "default_live_url")]
    pub url: String,
    /// Heartbeat period; 0 disables heartbeats (and with them the watchdog)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// How long a sent heartbeat may go unanswered; 0 disables the watchdog
    #[serde(default = "default_heartbeat_ack_timeout")]
    pub heartbeat_ack_timeout_ms: u64,
}

fn default_live_url() -> String {
    std::env::var("LIVE_WS_URL").unwrap_or_else(|_| "ws://localhost:3002".to_string())
}

fn default_heartbeat_interval() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_heartbeat_ack_timeout() -> u64 {
    10_000
}

impl LiveChannelConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_ack_timeout(&self) -> Option<Duration> {
        (self.heartbeat_ack_timeout_ms > 0).then(|| Duration::from_millis(self.heartbeat_ack_timeout_ms))
    }
}

impl Default for LiveChannelConfig {
    fn default() -> Self {
        Self {
            url: default_live_url(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            connect_timeout_ms: default_connect_timeout(),
            heartbeat_ack_timeout_ms: default_heartbeat_ack_timeout(),
        }
    }
}

/// Reconnect backoff configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay() -> u64 {
    1_000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// REST bulk fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_ms: u64,
}

fn default_api_url() -> String {
    std::env::var("LIVE_API_URL").unwrap_or_else(|_| "http://localhost:3001/api".to_string())
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_api_timeout() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            version: default_api_version(),
            timeout_ms: default_api_timeout(),
        }
    }
}

/// Local snapshot persistence
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_enabled")]
    pub enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

fn default_snapshot_enabled() -> bool {
    true
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("live-conditions-snapshot.json.gz")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: default_snapshot_enabled(),
            path: default_snapshot_path(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<LiveConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: LiveConfig = toml::from_str(&contents).context("Failed to parse config file")?;
    Ok(config)
}
