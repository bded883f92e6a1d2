//! Circuit pattern payload extraction.
//!
//! Pattern recognition reports recognized circuit roles grouped by
//! category. Only three categories feed classification and planning
//! (microcontrollers, sensor interfaces, digital interfaces); the rest are
//! kept as counts for the report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::analysis::netlist::str_field;

const MCU_KEY: &str = "microcontroller_circuits";
const SENSOR_KEY: &str = "sensor_interface_circuits";
const INTERFACE_KEY: &str = "digital_interface_circuits";

pub const CATEGORY_KEYS: [&str; 8] = [
    "power_supply_circuits",
    "amplifier_circuits",
    "filter_circuits",
    "oscillator_circuits",
    INTERFACE_KEY,
    MCU_KEY,
    SENSOR_KEY,
    "other_patterns",
];

/// A microcontroller recognized in the design.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McuPattern {
    pub component: String,
    pub family: String,
    pub model: String,
    pub features: String,
    pub value: String,
}

/// A sensor recognized in the design.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPattern {
    pub component: String,
    pub sensor_type: String,
    pub model: String,
    pub interface: String,
}

/// A digital bus or interface recognized in the design.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePattern {
    pub interface_type: String,
    pub signals_found: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternsByCategory {
    pub microcontrollers: Vec<McuPattern>,
    pub sensors: Vec<SensorPattern>,
    pub digital_interfaces: Vec<InterfacePattern>,
    /// Record count per category key, including empty categories that
    /// were present in the payload.
    pub counts: BTreeMap<String, usize>,
}

impl PatternsByCategory {
    /// Reads `identified_circuits` (or the top level when absent).
    pub fn from_value(data: &Value) -> Self {
        let circuits = data.get("identified_circuits").unwrap_or(data);
        let records = |key: &str| -> Vec<Value> {
            circuits
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        let counts = CATEGORY_KEYS
            .iter()
            .filter_map(|key| {
                circuits
                    .get(*key)
                    .and_then(Value::as_array)
                    .map(|items| (key.to_string(), items.len()))
            })
            .collect();

        Self {
            microcontrollers: records(MCU_KEY)
                .iter()
                .map(|r| McuPattern {
                    component: str_field(r, &["component", "reference"]),
                    family: str_field(r, &["family"]),
                    model: str_field(r, &["model"]),
                    features: features_text(r),
                    value: str_field(r, &["value"]),
                })
                .collect(),
            sensors: records(SENSOR_KEY)
                .iter()
                .map(|r| SensorPattern {
                    component: str_field(r, &["component", "reference"]),
                    sensor_type: str_field(r, &["type"]),
                    model: str_field(r, &["model"]),
                    interface: str_field(r, &["interface"]),
                })
                .collect(),
            digital_interfaces: records(INTERFACE_KEY)
                .iter()
                .map(|r| InterfacePattern {
                    interface_type: str_field(r, &["type"]),
                    signals_found: r
                        .get("signals_found")
                        .and_then(Value::as_array)
                        .map(|s| {
                            s.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect(),
            counts,
        }
    }

    /// Total number of pattern records across all categories.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Microcontroller record per component reference. The first record
    /// for a reference wins.
    pub fn mcu_index(&self) -> HashMap<&str, &McuPattern> {
        let mut index = HashMap::new();
        for mcu in &self.microcontrollers {
            if !mcu.component.is_empty() {
                index.entry(mcu.component.as_str()).or_insert(mcu);
            }
        }
        index
    }

    /// Sensor record per component reference. The first record wins.
    pub fn sensor_index(&self) -> HashMap<&str, &SensorPattern> {
        let mut index = HashMap::new();
        for sensor in &self.sensors {
            if !sensor.component.is_empty() {
                index.entry(sensor.component.as_str()).or_insert(sensor);
            }
        }
        index
    }
}

fn features_text(record: &Value) -> String {
    match record.get("features") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}
