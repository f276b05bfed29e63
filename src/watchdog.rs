//! ==============================================================================
//! watchdog.rs - agent self-termination on heartbeat silence
//! ==============================================================================
//!
//! purpose:
//!     the agent must never outlive its controller, and the controller may die
//!     without warning (crash, force-kill). there is no shutdown message to wait
//!     for, so liveness is inferred from pings alone.
//!
//! states:
//!
//! ```text
//!     STARTING ──(grace period elapsed)──> ALIVE ──(silence > threshold)──> TERMINATED
//!
//!     - STARTING: no checks at all, whatever the silence.
//!     - ALIVE: every check interval, compare silence to the threshold.
//!     - TERMINATED: terminal. `Watchdog::run` returns and the agent exits 0.
//! ```
//!
//! relationships:
//!     - reads: heartbeat.rs (Liveness)
//!     - used by: agent.rs (exits the process when `run` returns)
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::config::WatchdogConfig;
use crate::heartbeat::Liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Starting,
    Alive,
    Terminated,
}

/// Why the watchdog fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub silence: Duration,
    pub uptime: Duration,
}

pub struct Watchdog {
    liveness: Arc<Liveness>,
    grace_period: Duration,
    liveness_timeout: Duration,
    check_interval: Duration,
}

impl Watchdog {
    pub fn new(liveness: Arc<Liveness>, config: &WatchdogConfig) -> Self {
        Self {
            liveness,
            grace_period: config.grace_period(),
            liveness_timeout: config.liveness_timeout(),
            check_interval: config.check_interval(),
        }
    }

    /// The state implied by time since start and time since the last ping.
    pub fn assess(&self, uptime: Duration, silence: Duration) -> WatchdogState {
        if uptime < self.grace_period {
            WatchdogState::Starting
        } else if silence > self.liveness_timeout {
            WatchdogState::Terminated
        } else {
            WatchdogState::Alive
        }
    }

    /// Wait out the grace period, then poll until the heartbeat goes silent.
    ///
    /// Returns only on the transition to TERMINATED; the caller is expected
    /// to exit the process right away.
    pub async fn run(&self) -> Expired {
        let started = Instant::now();
        tokio::time::sleep(self.grace_period).await;
        tracing::debug!("Watchdog armed");

        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let uptime = started.elapsed();
            let silence = self.liveness.silence();
            if self.assess(uptime, silence) == WatchdogState::Terminated {
                return Expired { silence, uptime };
            }
        }
    }
}
