//! Firmware bring-up planning: component classification and plan synthesis.

pub mod classifier;
pub mod plan;

pub use classifier::{
    classify, describe_components, Classification, ComponentCategory, ComponentDescription,
};
pub use plan::{synthesize, ComponentTasks, FirmwarePlan, PlanPhase};
