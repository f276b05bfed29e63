use serde::{Deserialize, Serialize};
use std::fmt;

/// one complete, ordered capture of every hardware node at one sampling instant.
/// on the wire it is the bare json array of nodes.
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq)]
#[serde(transparent)]
pub struct Snapshot {
    pub nodes: Vec<HardwareNode>,
}

/// a piece of hardware as enumerated by the hardware library
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct HardwareNode {
    /// opaque, stable identifier (e.g. "/cpu/0"); consumers join on it
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    /// hardware category string (e.g. "Cpu", "Memory")
    #[serde(rename = "Type")]
    pub kind: String,

    /// readings in hardware-library enumeration order
    #[serde(rename = "Sensors")]
    pub sensors: Vec<SensorReading>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SensorReading {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub kind: SensorType,

    /// `null` on the wire when the library has no value this cycle
    #[serde(rename = "Value")]
    pub value: Option<f64>,
}

/// sensor category reported by the hardware library.
/// categories this crate does not know about pass through as `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensorType {
    Voltage,
    Current,
    Power,
    Clock,
    Temperature,
    Load,
    Frequency,
    Fan,
    Flow,
    Control,
    Level,
    Factor,
    Data,
    SmallData,
    Throughput,
    TimeSpan,
    Energy,
    Noise,
    Humidity,
    Other(String),
}

impl SensorType {
    pub fn as_str(&self) -> &str {
        match self {
            SensorType::Voltage => "Voltage",
            SensorType::Current => "Current",
            SensorType::Power => "Power",
            SensorType::Clock => "Clock",
            SensorType::Temperature => "Temperature",
            SensorType::Load => "Load",
            SensorType::Frequency => "Frequency",
            SensorType::Fan => "Fan",
            SensorType::Flow => "Flow",
            SensorType::Control => "Control",
            SensorType::Level => "Level",
            SensorType::Factor => "Factor",
            SensorType::Data => "Data",
            SensorType::SmallData => "SmallData",
            SensorType::Throughput => "Throughput",
            SensorType::TimeSpan => "TimeSpan",
            SensorType::Energy => "Energy",
            SensorType::Noise => "Noise",
            SensorType::Humidity => "Humidity",
            SensorType::Other(s) => s,
        }
    }
}

impl From<String> for SensorType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Voltage" => SensorType::Voltage,
            "Current" => SensorType::Current,
            "Power" => SensorType::Power,
            "Clock" => SensorType::Clock,
            "Temperature" => SensorType::Temperature,
            "Load" => SensorType::Load,
            "Frequency" => SensorType::Frequency,
            "Fan" => SensorType::Fan,
            "Flow" => SensorType::Flow,
            "Control" => SensorType::Control,
            "Level" => SensorType::Level,
            "Factor" => SensorType::Factor,
            "Data" => SensorType::Data,
            "SmallData" => SensorType::SmallData,
            "Throughput" => SensorType::Throughput,
            "TimeSpan" => SensorType::TimeSpan,
            "Energy" => SensorType::Energy,
            "Noise" => SensorType::Noise,
            "Humidity" => SensorType::Humidity,
            _ => SensorType::Other(s),
        }
    }
}

impl From<SensorType> for String {
    fn from(kind: SensorType) -> Self {
        match kind {
            SensorType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Snapshot {
    pub fn new(nodes: Vec<HardwareNode>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn sensor_count(&self) -> usize {
        self.nodes.iter().map(|n| n.sensors.len()).sum()
    }

    /// resolve a reading by its (hardware id, sensor id) join key
    pub fn find(&self, hardware_id: &str, sensor_id: &str) -> Option<&SensorReading> {
        self.nodes
            .iter()
            .find(|n| n.id == hardware_id)
            .and_then(|n| n.sensors.iter().find(|s| s.id == sensor_id))
    }
}
