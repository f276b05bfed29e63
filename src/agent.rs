//! ==============================================================================
//! agent.rs - the isolated sampling agent
//! ==============================================================================
//!
//! three independent activities, sharing nothing but `Liveness`:
//!
//! ```text
//!     ┌──────────────────┐   ┌────────────────────┐   ┌──────────────────┐
//!     │ sampling loop    │   │ heartbeat receiver │   │ watchdog         │
//!     │ sample -> encode │   │ port B, blocks     │   │ 10s grace, then  │
//!     │ -> send (port A) │   │ forever            │   │ 1s checks        │
//!     └──────────────────┘   └─────────┬──────────┘   └────────┬─────────┘
//!                                      │   writes   Liveness   │ reads
//!                                      └───────────────────────┘
//! ```
//!
//! nothing here is cancellable and there is no graceful shutdown. the only
//! clean way out is the watchdog firing, which exits the process with code 0.
//! if the sampling loop or the receiver dies first, that is logged and the
//! agent exits with an error instead of idling until the watchdog fires.
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

use crate::config::BridgeConfig;
use crate::hardware::HardwareSampler;
use crate::heartbeat::{HeartbeatReceiver, Liveness};
use crate::transmit::{TransmitError, Transmitter};
use crate::watchdog::{Expired, Watchdog};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// the hardware library panicked; the sampler is gone with it
    #[error("sampling task failed: {0}")]
    Sampler(#[from] JoinError),

    #[error(transparent)]
    Transmit(#[from] TransmitError),
}

pub struct SamplingLoop {
    sampler: HardwareSampler,
    transmitter: Transmitter,
    interval: Duration,
    show_sensor_data: bool,
}

impl SamplingLoop {
    pub fn new(sampler: HardwareSampler, transmitter: Transmitter, interval: Duration) -> Self {
        Self { sampler, transmitter, interval, show_sensor_data: false }
    }

    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    /// One cycle: refresh, assemble, encode, send.
    ///
    /// Hardware refreshes block, so the sampler is moved onto the blocking
    /// pool for the refresh and handed back afterwards. A transmit error is
    /// informational only; callers may discard it.
    pub async fn cycle(&mut self) -> Result<usize, CycleError> {
        let mut sampler = std::mem::take(&mut self.sampler);
        let (sampler, snapshot) = tokio::task::spawn_blocking(move || {
            let snapshot = sampler.sample();
            (sampler, snapshot)
        })
        .await?;
        self.sampler = sampler;

        if self.show_sensor_data {
            for node in &snapshot.nodes {
                for s in &node.sensors {
                    tracing::info!(node = %node.name, sensor = %s.name, kind = %s.kind, value = ?s.value, "reading");
                }
            }
        }
        Ok(self.transmitter.send(&snapshot).await?)
    }

    /// Sample until the hardware library takes the sampler down. The delay
    /// runs from the end of one cycle to the start of the next, so the
    /// period is processing time plus `interval`.
    pub async fn run(mut self) {
        tracing::info!(
            nodes = self.sampler.node_count(),
            target = %self.transmitter.target(),
            interval_ms = self.interval.as_millis() as u64,
            "Sampling started"
        );
        loop {
            match self.cycle().await {
                Ok(_) => {}
                Err(CycleError::Transmit(e)) => tracing::debug!(error = %e, "Snapshot dropped"),
                Err(CycleError::Sampler(e)) => {
                    tracing::error!(error = %e, "Hardware sampling failed, sampling loop stopped");
                    return;
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// How the agent's activities came to an end.
#[derive(Debug)]
pub enum AgentExit {
    Expired(Expired),
    Stopped(&'static str),
}

fn task_ended(name: &'static str, result: Result<(), JoinError>) -> AgentExit {
    match result {
        Ok(()) => tracing::error!(task = name, "Agent task ended"),
        Err(e) => tracing::error!(task = name, error = %e, "Agent task panicked"),
    }
    AgentExit::Stopped(name)
}

/// Wait for the watchdog, or for either loop to die first.
pub async fn supervise(watchdog: &Watchdog, sampling: JoinHandle<()>, heartbeat: JoinHandle<()>) -> AgentExit {
    tokio::select! {
        expired = watchdog.run() => AgentExit::Expired(expired),
        result = sampling => task_ended("sampling loop", result),
        result = heartbeat => task_ended("heartbeat receiver", result),
    }
}

/// Run the agent until the watchdog fires, then exit the process.
pub async fn run(config: &BridgeConfig) -> anyhow::Result<()> {
    let liveness = Arc::new(Liveness::new());

    let receiver = HeartbeatReceiver::bind(config.agent.heartbeat_addr(), liveness.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind heartbeat port {}: {}", config.agent.heartbeat_addr(), e))?;
    let transmitter = Transmitter::bind(config.agent.data_addr()).await?;

    // hardware handles are opened once and owned by the sampling loop
    let sampler = HardwareSampler::open(&config.hardware);
    let sampling = SamplingLoop::new(sampler, transmitter, config.agent.sample_interval())
        .show_sensor_data(config.logging.show_sensor_data);

    let heartbeat = tokio::spawn(receiver.run());
    let sampling = tokio::spawn(sampling.run());

    let watchdog = Watchdog::new(liveness, &config.watchdog);
    match supervise(&watchdog, sampling, heartbeat).await {
        AgentExit::Expired(expired) => {
            tracing::warn!(
                silence_ms = expired.silence.as_millis() as u64,
                uptime_secs = expired.uptime.as_secs(),
                "Heartbeat lost, controller is gone - exiting"
            );
            std::process::exit(0);
        }
        AgentExit::Stopped(name) => Err(anyhow::anyhow!("Agent {} stopped unexpectedly", name)),
    }
}
