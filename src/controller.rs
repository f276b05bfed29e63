//! ==============================================================================
//! controller.rs - the monitor side: spawn, keep alive, consume
//! ==============================================================================
//!
//! purpose:
//!     owns the agent's lifetime without ever telling it to stop. the monitor
//!     spawns the agent, pings it on the heartbeat port, and listens for
//!     snapshots on the data port. when the monitor goes away for any reason
//!     the pings stop and the agent's watchdog takes it down.
//!
//! tasks:
//!     - HeartbeatSender (port B, every 3s)
//!     - DataListener -> ConsumerIngress (port A)
//!     - ConnectionMonitor (every 5s, 30s threshold)
//!     - connection log (watch channel transitions)
//!
//! ==============================================================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::process::{Child, Command};

use crate::config::BridgeConfig;
use crate::connection::{ConnectionMonitor, ConnectionState};
use crate::consumers::LogConsumer;
use crate::heartbeat::HeartbeatSender;
use crate::ingress::{ConsumerIngress, DataListener};

/// Find the agent executable.
///
/// an existing path is used as-is. otherwise look for its file name next to
/// the current executable, then in `binaries/` beside it, then one level up
/// in `binaries/`. falls back to the bare name for a PATH lookup.
pub fn resolve_agent_path(configured: &Path) -> PathBuf {
    if configured.exists() {
        return configured.to_path_buf();
    }
    let Some(file_name) = configured.file_name() else {
        return configured.to_path_buf();
    };

    let exe = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe.parent().unwrap_or(&exe);
    let candidates = [
        exe_dir.join(file_name),
        exe_dir.join("binaries").join(file_name),
        exe_dir.parent().unwrap_or(exe_dir).join("binaries").join(file_name),
    ];

    candidates
        .into_iter()
        .find(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(file_name))
}

/// Build the command that starts the agent.
///
/// without a configured path, the current binary is re-run as `agent`.
pub fn agent_command(config: &BridgeConfig, config_path: Option<&Path>) -> anyhow::Result<Command> {
    let mut command = match &config.controller.agent_path {
        Some(path) => Command::new(resolve_agent_path(path)),
        None => {
            let exe = std::env::current_exe().context("Failed to locate current executable")?;
            let mut c = Command::new(exe);
            if let Some(path) = config_path {
                c.arg("--config").arg(path);
            }
            c.arg("agent");
            c
        }
    };
    // the agent's own watchdog decides when it dies
    command.kill_on_drop(false);
    Ok(command)
}

pub fn spawn_agent(config: &BridgeConfig, config_path: Option<&Path>) -> anyhow::Result<Child> {
    let mut command = agent_command(config, config_path)?;
    let child = command.spawn().context("Failed to spawn sensor agent")?;
    tracing::info!(pid = child.id(), "Sensor agent spawned");
    Ok(child)
}

async fn log_connection_changes(state: Arc<ConnectionState>) {
    let mut rx = state.subscribe();
    while rx.changed().await.is_ok() {
        if *rx.borrow_and_update() {
            tracing::info!("Telemetry connected");
        } else {
            tracing::warn!("Telemetry stale - marked disconnected");
        }
    }
}

/// Run the monitor until Ctrl-C. The agent is left to its watchdog.
pub async fn run(config: &BridgeConfig, config_path: Option<&Path>) -> anyhow::Result<()> {
    let state = Arc::new(ConnectionState::new());
    let ingress = Arc::new(
        ConsumerIngress::new(state.clone())
            .with_consumer(Arc::new(LogConsumer::new(config.logging.show_sensor_data))),
    );

    let listener = DataListener::bind(config.agent.data_addr())
        .await
        .with_context(|| format!("Failed to bind data port {}", config.agent.data_addr()))?;
    let heartbeat =
        HeartbeatSender::bind(config.agent.heartbeat_addr(), config.controller.heartbeat_interval()).await?;

    let _agent = if config.controller.spawn_agent {
        Some(spawn_agent(config, config_path)?)
    } else {
        tracing::info!("Not spawning agent; expecting one already running");
        None
    };

    tokio::spawn(heartbeat.run());
    tokio::spawn(ConnectionMonitor::new(state.clone(), &config.consumer).run());
    tokio::spawn(log_connection_changes(state));

    tokio::select! {
        _ = listener.run(ingress) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted - heartbeats stop, agent will exit on its own");
        }
    }
    Ok(())
}
