//! Component Classifier
//!
//! Assigns every netlist component a category, a short technical
//! description and a list of firmware tasks.
//!
//! Precedence, first match wins:
//! 1. Component referenced by a microcontroller pattern record
//! 2. Component referenced by a sensor pattern record
//! 3. Structural inference from the reference prefix and value text,
//!    evaluated as an ordered rule table ([`STRUCTURAL_RULES`])
//!
//! Classification is total and deterministic: missing fields degrade to
//! `"Unknown"` in descriptions instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{McuPattern, NetlistComponent, PatternsByCategory, SensorPattern};

/// Part-number prefixes that identify a microcontroller family. A token
/// matches at the start of a word in the value; tokens ending in a letter
/// must be followed by a digit (`PIC16F877`, not `PICOBLADE`).
pub const MCU_FAMILY_TOKENS: &[&str] = &[
    "STM32", "ATMEGA", "ATTINY", "ESP32", "ESP8266", "RP2040", "NRF52", "PIC", "SAMD", "MSP430",
];

/// Library-id or value substrings that identify a sensor
pub const SENSOR_TOKENS: &[&str] = &[
    "SENSOR", "BME", "BMP", "BMI", "MPU", "LIS", "LSM", "SHT", "HTU", "TMP", "DS18B20", "INA2",
    "ADXL",
];

const MCU_TASKS: [&str; 4] = [
    "Configure system clock tree and PLL",
    "Set up SWD/JTAG debug access and flash programming",
    "Initialize GPIO, interrupts and peripheral clocks",
    "Bring up startup code, linker script and HAL/RTOS",
];

const LED_TASKS: [&str; 2] = [
    "Configure GPIO output for the LED",
    "Implement PWM brightness or blink patterns",
];

const SWITCH_TASKS: [&str; 2] = [
    "Configure GPIO input with pull-up/pull-down",
    "Implement debounce logic",
];

const USB_TASKS: [&str; 3] = [
    "Initialize USB peripheral and its clock",
    "Integrate USB device stack and descriptors",
    "Verify enumeration on a host",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentCategory {
    Microcontroller,
    Sensor,
    #[serde(rename = "IC")]
    Ic,
    Resistor,
    Capacitor,
    Inductor,
    #[serde(rename = "LED")]
    Led,
    Diode,
    Transistor,
    Connector,
    Switch,
    #[serde(rename = "Crystal/Oscillator")]
    CrystalOscillator,
    Component,
}

impl ComponentCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentCategory::Microcontroller => "Microcontroller",
            ComponentCategory::Sensor => "Sensor",
            ComponentCategory::Ic => "IC",
            ComponentCategory::Resistor => "Resistor",
            ComponentCategory::Capacitor => "Capacitor",
            ComponentCategory::Inductor => "Inductor",
            ComponentCategory::Led => "LED",
            ComponentCategory::Diode => "Diode",
            ComponentCategory::Transistor => "Transistor",
            ComponentCategory::Connector => "Connector",
            ComponentCategory::Switch => "Switch",
            ComponentCategory::CrystalOscillator => "Crystal/Oscillator",
            ComponentCategory::Component => "Component",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized view of a component used by the structural rules.
struct Features {
    prefix: String,
    value: String,
    library_id: String,
}

impl Features {
    fn new(reference: &str, value: &str, library_id: &str) -> Self {
        Self {
            prefix: reference
                .trim()
                .chars()
                .take_while(|c| c.is_alphabetic())
                .collect::<String>()
                .to_uppercase(),
            value: value.to_uppercase(),
            library_id: library_id.to_uppercase(),
        }
    }

    fn prefix_is(&self, prefixes: &[&str]) -> bool {
        prefixes.contains(&self.prefix.as_str())
    }

    fn value_has(&self, token: &str) -> bool {
        self.value.contains(token)
    }

    fn value_has_part_prefix(&self, token: &str) -> bool {
        self.value
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter_map(|word| word.strip_prefix(token))
            .any(|rest| {
                rest.is_empty()
                    || token.ends_with(|c: char| c.is_ascii_digit())
                    || rest.starts_with(|c: char| c.is_ascii_digit())
            })
    }
}

pub struct StructuralRule {
    pub category: ComponentCategory,
    matches: fn(&Features) -> bool,
}

/// Structural inference, evaluated top to bottom.
pub const STRUCTURAL_RULES: &[StructuralRule] = &[
    StructuralRule {
        category: ComponentCategory::Microcontroller,
        matches: |f: &Features| MCU_FAMILY_TOKENS.iter().any(|t| f.value_has_part_prefix(t)),
    },
    StructuralRule {
        category: ComponentCategory::Ic,
        matches: |f: &Features| f.prefix_is(&["U"]),
    },
    StructuralRule {
        category: ComponentCategory::Resistor,
        matches: |f: &Features| f.prefix_is(&["R"]),
    },
    StructuralRule {
        category: ComponentCategory::Capacitor,
        matches: |f: &Features| f.prefix_is(&["C"]),
    },
    StructuralRule {
        category: ComponentCategory::Inductor,
        matches: |f: &Features| f.prefix_is(&["L"]),
    },
    StructuralRule {
        category: ComponentCategory::Led,
        matches: |f: &Features| f.prefix_is(&["D"]) && f.value_has("LED"),
    },
    StructuralRule {
        category: ComponentCategory::Diode,
        matches: |f: &Features| f.prefix_is(&["D"]),
    },
    StructuralRule {
        category: ComponentCategory::Transistor,
        matches: |f: &Features| f.prefix_is(&["Q"]),
    },
    StructuralRule {
        category: ComponentCategory::Connector,
        matches: |f: &Features| f.prefix_is(&["J", "P"]) || f.value_has("CONN"),
    },
    StructuralRule {
        category: ComponentCategory::Switch,
        matches: |f: &Features| f.prefix_is(&["SW"]) || f.value_has("SWITCH"),
    },
    StructuralRule {
        category: ComponentCategory::CrystalOscillator,
        matches: |f: &Features| f.prefix_is(&["Y", "X"]) || f.value_has("CRYSTAL"),
    },
    StructuralRule {
        category: ComponentCategory::Sensor,
        matches: |f: &Features| {
            SENSOR_TOKENS
                .iter()
                .any(|t| f.library_id.contains(t) || f.value.contains(t))
        },
    },
];

/// Result of classifying one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: ComponentCategory,
    pub description: String,
    pub firmware_tasks: Vec<String>,
}

/// A netlist component together with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescription {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub library_id: String,
    pub category: ComponentCategory,
    pub description: String,
    pub firmware_tasks: Vec<String>,
}

fn or_unknown(s: &str) -> &str {
    let s = s.trim();
    if s.is_empty() {
        "Unknown"
    } else {
        s
    }
}

fn to_tasks(tasks: &[&str]) -> Vec<String> {
    tasks.iter().map(|t| t.to_string()).collect()
}

/// Classify one component.
pub fn classify(
    reference: &str,
    value: &str,
    library_id: &str,
    mcu: Option<&McuPattern>,
    sensor: Option<&SensorPattern>,
) -> Classification {
    if let Some(mcu) = mcu {
        return classify_mcu_pattern(value, mcu);
    }
    if let Some(sensor) = sensor {
        return classify_sensor_pattern(value, sensor);
    }

    let features = Features::new(reference, value, library_id);
    let category = STRUCTURAL_RULES
        .iter()
        .find(|rule| (rule.matches)(&features))
        .map(|rule| rule.category)
        .unwrap_or(ComponentCategory::Component);

    Classification {
        category,
        description: structural_description(category, or_unknown(value)),
        firmware_tasks: structural_tasks(category, &features),
    }
}

fn classify_mcu_pattern(value: &str, mcu: &McuPattern) -> Classification {
    let model = if mcu.model.trim().is_empty() {
        or_unknown(if mcu.value.trim().is_empty() { value } else { mcu.value.as_str() })
    } else {
        mcu.model.trim()
    };
    let mut description = format!("{} microcontroller ({})", or_unknown(&mcu.family), model);
    if !mcu.features.trim().is_empty() {
        description.push_str(&format!(" with {}", mcu.features.trim()));
    }
    description.push_str(". Runs the main firmware image.");

    Classification {
        category: ComponentCategory::Microcontroller,
        description,
        firmware_tasks: to_tasks(&MCU_TASKS),
    }
}

fn classify_sensor_pattern(value: &str, sensor: &SensorPattern) -> Classification {
    let model = if sensor.model.trim().is_empty() {
        or_unknown(value)
    } else {
        sensor.model.trim()
    };
    let kind = or_unknown(&sensor.sensor_type).replace('_', " ");
    let bus = if sensor.interface.trim().is_empty() {
        "its sensor interface".to_string()
    } else {
        sensor.interface.trim().to_string()
    };

    Classification {
        category: ComponentCategory::Sensor,
        description: format!("{} ({}) connected over {}.", kind, model, bus),
        firmware_tasks: vec![
            format!("Initialize {} bus and driver for {}", bus, model),
            "Read device ID register to verify communication".to_string(),
            "Apply calibration and configure measurement settings".to_string(),
            "Stream readings and validate against expected ranges".to_string(),
        ],
    }
}

fn structural_description(category: ComponentCategory, value: &str) -> String {
    match category {
        ComponentCategory::Microcontroller => {
            format!("Microcontroller ({}) running the main firmware.", value)
        }
        ComponentCategory::Sensor => format!("Sensor ({}) providing measurements to firmware.", value),
        ComponentCategory::Ic => format!("Integrated circuit ({}).", value),
        ComponentCategory::Resistor => format!(
            "Resistor ({}) for current limiting, biasing or pull-up/pull-down.",
            value
        ),
        ComponentCategory::Capacitor => format!(
            "Capacitor ({}) for decoupling, filtering or energy storage.",
            value
        ),
        ComponentCategory::Inductor => {
            format!("Inductor ({}) for power conversion or filtering.", value)
        }
        ComponentCategory::Led => format!("LED indicator ({}).", value),
        ComponentCategory::Diode => format!("Diode ({}) for rectification or protection.", value),
        ComponentCategory::Transistor => {
            format!("Transistor ({}) for switching or amplification.", value)
        }
        ComponentCategory::Connector => format!("Connector ({}) for external interfacing.", value),
        ComponentCategory::Switch => format!("Switch ({}) for user input.", value),
        ComponentCategory::CrystalOscillator => {
            format!("Crystal/oscillator ({}) providing a clock reference.", value)
        }
        ComponentCategory::Component => format!("Component ({}).", value),
    }
}

fn structural_tasks(category: ComponentCategory, features: &Features) -> Vec<String> {
    match category {
        ComponentCategory::Microcontroller => to_tasks(&MCU_TASKS),
        ComponentCategory::Led => to_tasks(&LED_TASKS),
        ComponentCategory::Switch => to_tasks(&SWITCH_TASKS),
        ComponentCategory::Connector if features.value_has("USB") => to_tasks(&USB_TASKS),
        _ => Vec::new(),
    }
}

/// Classify every component against the recognized patterns, keeping the
/// reference order of the input.
pub fn describe_components(
    components: &[NetlistComponent],
    patterns: &PatternsByCategory,
) -> Vec<ComponentDescription> {
    let mcus = patterns.mcu_index();
    let sensors = patterns.sensor_index();

    components
        .iter()
        .map(|c| {
            let reference = c.reference.as_str();
            let classification = classify(
                reference,
                &c.value,
                &c.library_id,
                mcus.get(reference).copied(),
                sensors.get(reference).copied(),
            );
            ComponentDescription {
                reference: c.reference.clone(),
                value: c.value.clone(),
                footprint: c.footprint.clone(),
                library_id: c.library_id.clone(),
                category: classification.category,
                description: classification.description,
                firmware_tasks: classification.firmware_tasks,
            }
        })
        .collect()
}
