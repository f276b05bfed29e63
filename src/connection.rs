//! Consumer-side connection state.
//!
//! `is_connected` goes true only when a snapshot was actually parsed
//! (`mark_received`), and goes false only when the periodic checker sees
//! the last update is older than the disconnect threshold. The checker never
//! touches `last_update`, and it keeps running after a disconnect so the
//! state heals as soon as data resumes.
//!
//! The two writers are not synchronized with each other. Last writer wins;
//! only eventual correctness is required.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ConsumerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub last_update_at: Instant,
}

#[derive(Debug)]
pub struct ConnectionState {
    origin: Instant,
    last_update_ms: AtomicU64,
    connected: watch::Sender<bool>,
}

impl ConnectionState {
    /// Starts disconnected, with `last_update` at creation time.
    pub fn new() -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            origin: Instant::now(),
            last_update_ms: AtomicU64::new(0),
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn last_update_at(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_update_ms.load(Ordering::Relaxed))
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            is_connected: self.is_connected(),
            last_update_at: self.last_update_at(),
        }
    }

    /// Observe connected/disconnected transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// A snapshot was parsed just now.
    pub fn mark_received(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_update_ms.store(now, Ordering::Relaxed);
        self.set_connected(true);
    }

    /// Mark disconnected if the last update is older than `threshold`.
    /// Returns the resulting connection flag.
    pub fn check_stale(&self, threshold: Duration) -> bool {
        let age = Instant::now().saturating_duration_since(self.last_update_at());
        if age > threshold {
            self.set_connected(false);
        }
        self.is_connected()
    }

    fn set_connected(&self, value: bool) {
        self.connected.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic staleness checker.
pub struct ConnectionMonitor {
    state: Arc<ConnectionState>,
    disconnect_timeout: Duration,
    check_interval: Duration,
}

impl ConnectionMonitor {
    pub fn new(state: Arc<ConnectionState>, config: &ConsumerConfig) -> Self {
        Self {
            state,
            disconnect_timeout: config.disconnect_timeout(),
            check_interval: config.check_interval(),
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.state.check_stale(self.disconnect_timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_monitor(state: &Arc<ConnectionState>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(ConnectionMonitor::new(state.clone(), &ConsumerConfig::default()).run())
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_disconnected() {
        let state = ConnectionState::new();
        assert!(!state.is_connected());
        assert!(!state.check_stale(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_connects_immediately() {
        let state = ConnectionState::new();
        tokio::time::sleep(Duration::from_secs(7)).await;
        state.mark_received();

        let status = state.status();
        assert!(status.is_connected);
        assert_eq!(status.last_update_at, Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_never_connects() {
        let state = ConnectionState::new();
        for _ in 0..10 {
            assert!(!state.check_stale(Duration::from_secs(30)));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnects_by_next_tick_after_threshold() {
        let state = Arc::new(ConnectionState::new());
        let monitor = spawn_monitor(&state);
        state.mark_received();

        tokio::time::sleep(Duration::from_secs(31)).await;
        // the t=30 tick saw exactly 30s, which is not beyond the threshold
        assert!(state.is_connected());

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert!(!state.is_connected());
        monitor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_does_not_wait_for_tick() {
        let state = Arc::new(ConnectionState::new());
        let monitor = spawn_monitor(&state);
        state.mark_received();

        tokio::time::sleep(Duration::from_secs(36)).await;
        assert!(!state.is_connected());

        tokio::time::sleep(Duration::from_millis(500)).await;
        state.mark_received();
        assert!(state.is_connected());

        // and the checker leaves it alone while data is fresh
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(state.is_connected());
        monitor.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_transitions() {
        let state = Arc::new(ConnectionState::new());
        let mut rx = state.subscribe();

        state.mark_received();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        // no change notification for a repeat
        state.mark_received();
        assert!(!rx.has_changed().unwrap());

        tokio::time::sleep(Duration::from_secs(31)).await;
        state.check_stale(Duration::from_secs(30));
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
