//! ==============================================================================
//! config.rs - Bridge Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `bridge.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - AgentConfig: loopback ports and the sampling cadence.
//!     - WatchdogConfig: grace period, liveness threshold, check interval.
//!     - ConsumerConfig: disconnect threshold and checker interval.
//!     - ControllerConfig: heartbeat cadence and how the agent is spawned.
//!     - HardwareConfig: toggles for the individual hardware nodes.
//!     - LoggingConfig: log level and per-sensor output.
//!
//! the timing constants are deliberately independent of each other. nothing
//! here derives one from another.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// port A: snapshots, agent -> controller
    pub data_port: u16,
    /// port B: heartbeats, controller -> agent
    pub heartbeat_port: u16,
    /// delay between the end of one cycle and the start of the next
    pub sample_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WatchdogConfig {
    pub grace_period_secs: u64,
    pub liveness_timeout_secs: u64,
    pub check_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConsumerConfig {
    pub disconnect_timeout_secs: u64,
    pub check_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub heartbeat_interval_secs: u64,
    pub spawn_agent: bool,
    /// agent executable; the monitor re-runs itself with `agent` when unset
    pub agent_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    pub cpu: bool,
    pub memory: bool,
    pub sensors: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { data_port: 14242, heartbeat_port: 14243, sample_interval_ms: 1000 }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { grace_period_secs: 10, liveness_timeout_secs: 5, check_interval_secs: 1 }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { disconnect_timeout_secs: 30, check_interval_secs: 5 }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { heartbeat_interval_secs: 3, spawn_agent: true, agent_path: None }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self { cpu: true, memory: true, sensors: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: false }
    }
}

impl AgentConfig {
    pub fn data_addr(&self) -> SocketAddr {
        loopback(self.data_port)
    }

    pub fn heartbeat_addr(&self) -> SocketAddr {
        loopback(self.heartbeat_port)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl WatchdogConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl ConsumerConfig {
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnect_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl ControllerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Both channels bind strictly to 127.0.0.1, never a wildcard address.
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// Where the effective configuration came from.
///
/// Loading happens before the log subscriber exists, so the outcome is
/// returned and reported by the caller once logging is up.
#[derive(Debug)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults { failures: Vec<(PathBuf, String)> },
}

impl BridgeConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject periods the timer loops cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let periods = [
            ("agent.sample_interval_ms", self.agent.sample_interval_ms),
            ("watchdog.check_interval_secs", self.watchdog.check_interval_secs),
            ("consumer.check_interval_secs", self.consumer.check_interval_secs),
            ("controller.heartbeat_interval_secs", self.controller.heartbeat_interval_secs),
        ];
        for (key, value) in periods {
            if value == 0 {
                anyhow::bail!("Invalid config: {} must be greater than zero", key);
            }
        }
        Ok(())
    }

    /// Load with default fallback
    ///
    /// an explicit path is tried first, then `config/bridge.toml` and
    /// `../config/bridge.toml`.
    pub fn load_or_default(explicit: Option<&Path>) -> (Self, ConfigOrigin) {
        let mut paths = Vec::new();
        if let Some(path) = explicit {
            paths.push(path.to_path_buf());
        }
        paths.push(PathBuf::from("config").join("bridge.toml"));
        paths.push(PathBuf::from("..").join("config").join("bridge.toml"));

        let mut failures = Vec::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => return (config, ConfigOrigin::File(path)),
                Err(e) => failures.push((path, e.to_string())),
            }
        }

        (Self::default(), ConfigOrigin::Defaults { failures })
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        tracing::info!(
            data_addr = %self.agent.data_addr(),
            heartbeat_addr = %self.agent.heartbeat_addr(),
            sample_interval_ms = self.agent.sample_interval_ms,
            "channels"
        );
        tracing::info!(
            grace_secs = self.watchdog.grace_period_secs,
            liveness_secs = self.watchdog.liveness_timeout_secs,
            check_secs = self.watchdog.check_interval_secs,
            "watchdog"
        );
        tracing::info!(
            disconnect_secs = self.consumer.disconnect_timeout_secs,
            check_secs = self.consumer.check_interval_secs,
            heartbeat_secs = self.controller.heartbeat_interval_secs,
            "consumer"
        );
    }
}

impl ConfigOrigin {
    pub fn report(&self) {
        match self {
            ConfigOrigin::File(path) => {
                tracing::info!(path = %path.display(), "Loaded configuration");
            }
            ConfigOrigin::Defaults { failures } => {
                for (path, error) in failures {
                    tracing::warn!(path = %path.display(), %error, "Failed to load config");
                }
                tracing::warn!("No usable config file found - using defaults");
            }
        }
    }
}
