//! ==============================================================================
//! hardware.rs - Hardware Abstraction Layer
//! ==============================================================================
//!
//! purpose:
//!     the agent-side view of the hardware library. every node the library
//!     enumerates is a `HardwareDevice`; the `HardwareSampler` refreshes each
//!     one per cycle and assembles a `Snapshot` in enumeration order.
//!
//! failure policy:
//!     - opening: a subsystem that is unavailable at startup is simply not
//!       opened. the device list may end up empty; that is degraded operation,
//!       not an error.
//!     - refreshing: a failed `update()` is logged and the node keeps its
//!       last-known (stale) readings. one bad node never aborts a cycle.
//!
//! relationships:
//!     - used by: agent.rs (sampling loop)
//!     - uses: sysinfo (cpu, memory, thermal components)
//!
//! ==============================================================================

use crate::config::HardwareConfig;
use crate::domain::{HardwareNode, SensorReading, SensorType, Snapshot};

use sysinfo::{Components, System};

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("{0} unavailable")]
    Unavailable(&'static str),

    #[error("refresh failed: {0}")]
    Refresh(String),
}

/// One node as enumerated by the hardware library.
///
/// `sensors()` reports whatever the last successful `update()` left behind,
/// so after a failed refresh the node still reads, just stale.
pub trait HardwareDevice: Send {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn kind(&self) -> &str;
    fn update(&mut self) -> Result<(), SampleError>;
    fn sensors(&self) -> Vec<SensorReading>;
}

// ==============================================================================================
// SAMPLER
// ==============================================================================================

#[derive(Default)]
pub struct HardwareSampler {
    devices: Vec<Box<dyn HardwareDevice>>,
}

impl HardwareSampler {
    pub fn new(devices: Vec<Box<dyn HardwareDevice>>) -> Self {
        Self { devices }
    }

    /// Open every enabled sysinfo-backed node.
    pub fn open(config: &HardwareConfig) -> Self {
        let mut devices: Vec<Box<dyn HardwareDevice>> = Vec::new();

        if config.cpu {
            match CpuDevice::open() {
                Some(d) => devices.push(Box::new(d)),
                None => tracing::warn!("CPU metrics unavailable"),
            }
        }
        if config.memory {
            match MemoryDevice::open() {
                Some(d) => devices.push(Box::new(d)),
                None => tracing::warn!("Memory metrics unavailable"),
            }
        }
        if config.sensors {
            match ThermalDevice::open() {
                Some(d) => devices.push(Box::new(d)),
                None => tracing::warn!("No thermal components found"),
            }
        }

        tracing::info!(nodes = devices.len(), "Hardware opened");
        Self::new(devices)
    }

    pub fn node_count(&self) -> usize {
        self.devices.len()
    }

    /// Refresh every node and build this cycle's snapshot.
    pub fn sample(&mut self) -> Snapshot {
        let nodes = self
            .devices
            .iter_mut()
            .map(|device| {
                if let Err(e) = device.update() {
                    tracing::warn!(node = device.id(), error = %e, "Refresh failed, keeping stale readings");
                }
                HardwareNode {
                    id: device.id().to_string(),
                    name: device.name().to_string(),
                    kind: device.kind().to_string(),
                    sensors: device.sensors(),
                }
            })
            .collect();

        Snapshot::new(nodes)
    }
}

fn reading(id: String, name: String, kind: SensorType, value: f64) -> SensorReading {
    SensorReading {
        id,
        name,
        kind,
        value: value.is_finite().then_some(value),
    }
}

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

// ==============================================================================================
// CPU
// ==============================================================================================

pub struct CpuDevice {
    system: System,
    name: String,
}

impl CpuDevice {
    pub fn open() -> Option<Self> {
        let mut system = System::new();
        system.refresh_cpu();
        let brand = system.cpus().first()?.brand().trim().to_string();
        let name = if brand.is_empty() { "CPU".to_string() } else { brand };
        Some(Self { system, name })
    }
}

impl HardwareDevice for CpuDevice {
    fn id(&self) -> &str {
        "/cpu/0"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "Cpu"
    }

    fn update(&mut self) -> Result<(), SampleError> {
        self.system.refresh_cpu();
        if self.system.cpus().is_empty() {
            return Err(SampleError::Unavailable("cpu"));
        }
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorReading> {
        let cpus = self.system.cpus();
        let mut sensors = Vec::with_capacity(1 + cpus.len() * 2);

        sensors.push(reading(
            "/cpu/0/load/0".to_string(),
            "CPU Total".to_string(),
            SensorType::Load,
            self.system.global_cpu_info().cpu_usage() as f64,
        ));
        for (i, cpu) in cpus.iter().enumerate() {
            sensors.push(reading(
                format!("/cpu/0/load/{}", i + 1),
                format!("CPU Core #{}", i + 1),
                SensorType::Load,
                cpu.cpu_usage() as f64,
            ));
        }
        for (i, cpu) in cpus.iter().enumerate() {
            sensors.push(reading(
                format!("/cpu/0/clock/{}", i + 1),
                format!("CPU Core #{}", i + 1),
                SensorType::Clock,
                cpu.frequency() as f64,
            ));
        }
        sensors
    }
}

// ==============================================================================================
// MEMORY
// ==============================================================================================

pub struct MemoryDevice {
    system: System,
}

impl MemoryDevice {
    pub fn open() -> Option<Self> {
        let mut system = System::new();
        system.refresh_memory();
        (system.total_memory() > 0).then_some(Self { system })
    }
}

impl HardwareDevice for MemoryDevice {
    fn id(&self) -> &str {
        "/ram"
    }

    fn name(&self) -> &str {
        "Total Memory"
    }

    fn kind(&self) -> &str {
        "Memory"
    }

    fn update(&mut self) -> Result<(), SampleError> {
        self.system.refresh_memory();
        if self.system.total_memory() == 0 {
            return Err(SampleError::Refresh("total memory reported as zero".to_string()));
        }
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorReading> {
        let total = self.system.total_memory() as f64;
        let used = self.system.used_memory() as f64;
        let available = self.system.available_memory() as f64;
        let load = if total > 0.0 { used / total * 100.0 } else { f64::NAN };

        vec![
            reading("/ram/load/0".to_string(), "Memory".to_string(), SensorType::Load, load),
            reading("/ram/data/0".to_string(), "Memory Used".to_string(), SensorType::Data, used / BYTES_PER_GB),
            reading(
                "/ram/data/1".to_string(),
                "Memory Available".to_string(),
                SensorType::Data,
                available / BYTES_PER_GB,
            ),
        ]
    }
}

// ==============================================================================================
// THERMAL COMPONENTS
// ==============================================================================================

pub struct ThermalDevice {
    components: Components,
}

impl ThermalDevice {
    pub fn open() -> Option<Self> {
        let components = Components::new_with_refreshed_list();
        (!components.list().is_empty()).then_some(Self { components })
    }
}

impl HardwareDevice for ThermalDevice {
    fn id(&self) -> &str {
        "/sensors"
    }

    fn name(&self) -> &str {
        "Thermal Sensors"
    }

    fn kind(&self) -> &str {
        "SuperIO"
    }

    fn update(&mut self) -> Result<(), SampleError> {
        self.components.refresh();
        if self.components.list().is_empty() {
            return Err(SampleError::Unavailable("thermal components"));
        }
        Ok(())
    }

    fn sensors(&self) -> Vec<SensorReading> {
        self.components
            .list()
            .iter()
            .enumerate()
            .map(|(i, c)| {
                reading(
                    format!("/sensors/temperature/{i}"),
                    c.label().to_string(),
                    SensorType::Temperature,
                    c.temperature() as f64,
                )
            })
            .collect()
    }
}
