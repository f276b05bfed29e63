//! Pluggable snapshot consumers.
//!
//! Rendering code binds a UI slot to a sensor through the
//! (hardware id, sensor id) join key and pulls values out of whatever
//! snapshot it was handed last. The ingress path does not know which
//! consumers exist; it just calls `consume` on each.

use std::sync::RwLock;

use crate::domain::{HardwareNode, SensorReading, Snapshot};

pub trait SnapshotConsumer: Send + Sync {
    fn consume(&self, snapshot: &Snapshot);
}

/// Keeps the most recently published snapshot.
#[derive(Default)]
pub struct LatestSnapshot {
    latest: RwLock<Option<Snapshot>>,
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Snapshot> {
        self.latest.read().ok().and_then(|guard| guard.clone())
    }

    /// Current value of one sensor, if it was present and had a reading.
    pub fn value_of(&self, hardware_id: &str, sensor_id: &str) -> Option<f64> {
        let guard = self.latest.read().ok()?;
        let value = guard.as_ref()?.find(hardware_id, sensor_id)?.value;
        value
    }
}

impl SnapshotConsumer for LatestSnapshot {
    fn consume(&self, snapshot: &Snapshot) {
        if let Ok(mut guard) = self.latest.write() {
            *guard = Some(snapshot.clone());
        }
    }
}

/// Logs a line per snapshot, and every reading when `show_sensor_data` is set.
pub struct LogConsumer {
    show_sensor_data: bool,
}

impl LogConsumer {
    pub fn new(show_sensor_data: bool) -> Self {
        Self { show_sensor_data }
    }
}

impl SnapshotConsumer for LogConsumer {
    fn consume(&self, snapshot: &Snapshot) {
        tracing::debug!(nodes = snapshot.nodes.len(), sensors = snapshot.sensor_count(), "snapshot");
        if !self.show_sensor_data {
            return;
        }
        for node in &snapshot.nodes {
            for s in &node.sensors {
                tracing::info!("{}", format_reading(node, s));
            }
        }
    }
}

/// `[node] sensor (type): value`, with `-` for a sensor that has no reading.
fn format_reading(node: &HardwareNode, sensor: &SensorReading) -> String {
    match sensor.value {
        Some(v) => format!("[{}] {} ({}): {:.1}", node.name, sensor.name, sensor.kind, v),
        None => format!("[{}] {} ({}): -", node.name, sensor.name, sensor.kind),
    }
}
