//! Snapshot wire form.
//!
//! A snapshot travels as one UTF-8 JSON array of hardware nodes, one
//! datagram per snapshot. Encoding itself has no size limit; whether the
//! text fits a datagram is decided by the transmitter.

use crate::domain::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a snapshot to its compact wire text.
pub fn encode(snapshot: &Snapshot) -> Result<String, CodecError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Parse wire text back into a snapshot.
pub fn decode(payload: &str) -> Result<Snapshot, CodecError> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HardwareNode, SensorReading, SensorType};

    fn snapshot(nodes: usize, sensors: usize) -> Snapshot {
        Snapshot::new(
            (0..nodes)
                .map(|n| HardwareNode {
                    id: format!("/hw/{n}"),
                    name: format!("Node {n}"),
                    kind: "Cpu".to_string(),
                    sensors: (0..sensors)
                        .map(|s| SensorReading {
                            id: format!("/hw/{n}/temperature/{s}"),
                            name: format!("Core #{s}"),
                            kind: SensorType::Temperature,
                            value: Some(30.0 + (n * sensors + s) as f64 * 0.37),
                        })
                        .collect(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_wire_shape() {
        let json = encode(&snapshot(1, 1)).unwrap();
        assert_eq!(
            json,
            r#"[{"Id":"/hw/0","Name":"Node 0","Type":"Cpu","Sensors":[{"Id":"/hw/0/temperature/0","Name":"Core #0","Type":"Temperature","Value":30.0}]}]"#
        );
    }

    #[test]
    fn test_round_trip_preserves_order() {
        for (nodes, sensors) in [(0, 0), (1, 0), (1, 1), (50, 1), (1, 50), (50, 50)] {
            let original = snapshot(nodes, sensors);
            let decoded = decode(&encode(&original).unwrap()).unwrap();
            assert_eq!(decoded, original, "{nodes}x{sensors}");
        }
    }

    #[test]
    fn test_empty_snapshot_is_empty_array() {
        assert_eq!(encode(&Snapshot::default()).unwrap(), "[]");
    }

    #[test]
    fn test_null_value_and_unknown_type() {
        let decoded = decode(
            r#"[{"Id":"/gpu/0","Name":"GPU","Type":"GpuNvidia","Sensors":[
                {"Id":"/gpu/0/x/0","Name":"X","Type":"Radiation","Value":null}]}]"#,
        )
        .unwrap();

        let sensor = &decoded.nodes[0].sensors[0];
        assert_eq!(sensor.value, None);
        assert_eq!(sensor.kind, SensorType::Other("Radiation".to_string()));
        assert!(encode(&decoded).unwrap().contains(r#""Type":"Radiation","Value":null"#));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("").is_err());
        assert!(decode("{}").is_err());
        assert!(decode("[{\"Id\":\"x\"}]").is_err());
        assert!(decode("[1,2,3]").is_err());
    }

    #[test]
    fn test_large_snapshot_encodes_past_datagram_size() {
        let original = snapshot(50, 50);
        let json = encode(&original).unwrap();
        assert!(json.len() > 65_507);
        assert_eq!(decode(&json).unwrap(), original);
    }
}
