//! Plan Synthesizer
//!
//! Builds the phased firmware bring-up plan from recognized circuit
//! patterns and per-component classifications.

use serde::{Deserialize, Serialize};

use crate::analysis::PatternsByCategory;
use crate::firmware::classifier::ComponentDescription;

pub const PHASE_BOARD: &str = "Board Bring-up";
pub const PHASE_MCU: &str = "MCU Bring-up";
pub const PHASE_INTERFACES: &str = "Digital Interfaces";
pub const PHASE_SENSORS: &str = "Sensors";

const MAX_LISTED_SIGNALS: usize = 4;

const BOARD_TASKS: [&str; 4] = [
    "Verify power rails and current draw",
    "Check clock sources and reset circuitry",
    "Confirm debug access (SWD/JTAG)",
    "Run GPIO smoke test",
];

const MCU_PHASE_TASKS: [&str; 4] = [
    "Bring up the microcontroller clock tree and startup code",
    "Configure peripheral clocks and pin multiplexing",
    "Set up flash programming and debug workflow",
    "Establish HAL/RTOS baseline and logging output",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPhase {
    pub phase_name: String,
    pub tasks: Vec<String>,
}

impl PlanPhase {
    pub fn new(phase_name: impl Into<String>, tasks: Vec<String>) -> Self {
        Self {
            phase_name: phase_name.into(),
            tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTasks {
    pub reference: String,
    pub role: String,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwarePlan {
    pub overview: String,
    pub phases: Vec<PlanPhase>,
    pub per_component: Vec<ComponentTasks>,
}

impl FirmwarePlan {
    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.phase_name.as_str()).collect()
    }
}

/// Merge patterns and classifications into a plan. Never fails; with no
/// pattern data the plan holds only the board bring-up phase.
pub fn synthesize(components: &[ComponentDescription], patterns: &PatternsByCategory) -> FirmwarePlan {
    let mut phases = vec![PlanPhase::new(
        PHASE_BOARD,
        BOARD_TASKS.iter().map(|t| t.to_string()).collect(),
    )];

    if !patterns.microcontrollers.is_empty() {
        phases.push(PlanPhase::new(
            PHASE_MCU,
            MCU_PHASE_TASKS.iter().map(|t| t.to_string()).collect(),
        ));
    }

    if !patterns.digital_interfaces.is_empty() {
        let tasks = patterns
            .digital_interfaces
            .iter()
            .map(|iface| {
                let kind = readable(&iface.interface_type, "digital interface");
                if iface.signals_found.is_empty() {
                    format!("Bring up {}", kind)
                } else {
                    let signals: Vec<&str> = iface
                        .signals_found
                        .iter()
                        .take(MAX_LISTED_SIGNALS)
                        .map(String::as_str)
                        .collect();
                    format!("Bring up {} (signals: {})", kind, signals.join(", "))
                }
            })
            .collect();
        phases.push(PlanPhase::new(PHASE_INTERFACES, tasks));
    }

    if !patterns.sensors.is_empty() {
        let tasks = patterns
            .sensors
            .iter()
            .map(|sensor| {
                let kind = readable(&sensor.sensor_type, "sensor");
                let owner = if sensor.component.trim().is_empty() {
                    "unassigned component"
                } else {
                    sensor.component.trim()
                };
                format!("Integrate {} driver for {}", kind, owner)
            })
            .collect();
        phases.push(PlanPhase::new(PHASE_SENSORS, tasks));
    }

    let per_component = components
        .iter()
        .filter(|c| !c.firmware_tasks.is_empty())
        .map(|c| ComponentTasks {
            reference: c.reference.clone(),
            role: c.category.label().to_string(),
            tasks: c.firmware_tasks.clone(),
        })
        .collect();

    FirmwarePlan {
        overview: overview(components.len(), patterns),
        phases,
        per_component,
    }
}

fn readable(raw: &str, fallback: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        fallback.to_string()
    } else {
        raw.replace('_', " ")
    }
}

fn overview(component_count: usize, patterns: &PatternsByCategory) -> String {
    format!(
        "Firmware bring-up plan derived from {} components, {} microcontroller(s), {} digital interface(s) and {} sensor(s).",
        component_count,
        patterns.microcontrollers.len(),
        patterns.digital_interfaces.len(),
        patterns.sensors.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{InterfacePattern, McuPattern, SensorPattern};
    use crate::firmware::classifier::ComponentCategory;

    fn component(reference: &str, category: ComponentCategory, tasks: &[&str]) -> ComponentDescription {
        ComponentDescription {
            reference: reference.to_string(),
            value: String::new(),
            footprint: String::new(),
            library_id: String::new(),
            category,
            description: String::new(),
            firmware_tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_no_patterns_single_phase() {
        let plan = synthesize(&[], &PatternsByCategory::default());
        assert_eq!(plan.phase_names(), vec![PHASE_BOARD]);
        assert_eq!(plan.phases[0].tasks.len(), 4);
        assert!(plan.per_component.is_empty());
    }

    #[test]
    fn test_one_mcu_two_phases() {
        let patterns = PatternsByCategory {
            microcontrollers: vec![McuPattern::default()],
            ..Default::default()
        };
        let plan = synthesize(&[], &patterns);
        assert_eq!(plan.phase_names(), vec![PHASE_BOARD, PHASE_MCU]);
    }

    #[test]
    fn test_phase_order_fixed() {
        let patterns = PatternsByCategory {
            sensors: vec![SensorPattern {
                component: "U4".to_string(),
                sensor_type: "pressure_sensor".to_string(),
                ..Default::default()
            }],
            digital_interfaces: vec![InterfacePattern {
                interface_type: "spi_interface".to_string(),
                signals_found: ["MOSI", "MISO", "SCK", "CS", "IRQ"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }],
            microcontrollers: vec![McuPattern::default()],
            ..Default::default()
        };
        let plan = synthesize(&[], &patterns);
        assert_eq!(
            plan.phase_names(),
            vec![PHASE_BOARD, PHASE_MCU, PHASE_INTERFACES, PHASE_SENSORS]
        );
        assert_eq!(
            plan.phases[2].tasks[0],
            "Bring up spi interface (signals: MOSI, MISO, SCK, CS)"
        );
        assert_eq!(plan.phases[3].tasks[0], "Integrate pressure sensor driver for U4");
    }

    #[test]
    fn test_per_component_keeps_order_and_skips_empty() {
        let components = vec![
            component("D1", ComponentCategory::Led, &["a", "b"]),
            component("R1", ComponentCategory::Resistor, &[]),
            component("U1", ComponentCategory::Microcontroller, &["c"]),
        ];
        let plan = synthesize(&components, &PatternsByCategory::default());
        let refs: Vec<_> = plan.per_component.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["D1", "U1"]);
        assert_eq!(plan.per_component[0].role, "LED");
    }
}
