//! Netlist payload extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A component as reported by netlist extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetlistComponent {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub library_id: String,
}

/// Components and net count pulled from a netlist operation's data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetlistData {
    /// Sorted by reference
    pub components: Vec<NetlistComponent>,
    /// Component count the engine reported, if any
    pub reported_components: Option<u64>,
    pub net_count: Option<u64>,
}

impl NetlistData {
    /// Accepts `components` either as an object keyed by reference or as an
    /// array of records. Anything unrecognized yields an empty netlist.
    pub fn from_value(data: &Value) -> Self {
        let mut components: Vec<NetlistComponent> = match data.get("components") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(reference, info)| component_from(reference, info))
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|info| {
                    let reference = str_field(info, &["reference", "ref"]);
                    (!reference.is_empty()).then(|| component_from(&reference, info))
                })
                .collect(),
            _ => Vec::new(),
        };
        components.sort_by(|a, b| compare_references(&a.reference, &b.reference));
        // References are unique keys within a netlist.
        components.dedup_by(|a, b| a.reference == b.reference);

        let net_count = data.get("net_count").and_then(Value::as_u64).or_else(|| {
            match data.get("nets") {
                Some(Value::Object(map)) => Some(map.len() as u64),
                Some(Value::Array(items)) => Some(items.len() as u64),
                _ => None,
            }
        });

        Self {
            components,
            reported_components: data.get("component_count").and_then(Value::as_u64),
            net_count,
        }
    }
}

fn component_from(reference: &str, info: &Value) -> NetlistComponent {
    NetlistComponent {
        reference: reference.to_string(),
        value: str_field(info, &["value"]),
        footprint: str_field(info, &["footprint"]),
        library_id: str_field(info, &["lib_id", "libId", "library_id"]),
    }
}

pub(crate) fn str_field(info: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| info.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Case-insensitive ordering with the raw string as tiebreak, so the order
/// is total and stable.
pub fn compare_references(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_components_from_object() {
        let data = json!({
            "component_count": 2,
            "components": {
                "U1": {"value": "STM32F401", "lib_id": "MCU_ST:STM32F401", "footprint": "LQFP-64"},
                "R1": {"value": "10k"}
            },
            "nets": {"GND": [], "VCC": [], "SDA": []}
        });
        let netlist = NetlistData::from_value(&data);
        let refs: Vec<_> = netlist.components.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["R1", "U1"]);
        assert_eq!(netlist.components[1].library_id, "MCU_ST:STM32F401");
        assert_eq!(netlist.components[0].footprint, "");
        assert_eq!(netlist.reported_components, Some(2));
        assert_eq!(netlist.net_count, Some(3));
    }

    #[test]
    fn test_components_from_array() {
        let data = json!({
            "components": [
                {"reference": "c2", "value": "100nF"},
                {"reference": "C1", "value": "10uF"},
                {"value": "orphan"}
            ],
            "net_count": 7
        });
        let netlist = NetlistData::from_value(&data);
        let refs: Vec<_> = netlist.components.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["C1", "c2"]);
        assert_eq!(netlist.net_count, Some(7));
        assert_eq!(netlist.reported_components, None);
    }

    #[test]
    fn test_unrecognized_payload() {
        let netlist = NetlistData::from_value(&json!("raw text output"));
        assert!(netlist.components.is_empty());
        assert_eq!(netlist.net_count, None);
    }
}
