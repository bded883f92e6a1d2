//! Analysis operations and their outcomes
//!
//! Each validation run plans a fixed set of named operations against the
//! analysis engine. Every operation ends in exactly one of three states:
//! it produced data, it failed, or it never ran.

pub mod netlist;
pub mod orchestrator;
pub mod patterns;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::files::DesignFiles;

pub use netlist::{NetlistComponent, NetlistData};
pub use orchestrator::Orchestrator;
pub use patterns::{InterfacePattern, McuPattern, PatternsByCategory, SensorPattern};

/// Named analysis operations. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnalysisOp {
    #[serde(rename = "project-validate")]
    ProjectValidate,
    #[serde(rename = "drc")]
    Drc,
    #[serde(rename = "boundaries")]
    Boundaries,
    #[serde(rename = "netlist")]
    Netlist,
    #[serde(rename = "patterns")]
    Patterns,
    #[serde(rename = "bom")]
    Bom,
}

impl AnalysisOp {
    pub const ALL: [AnalysisOp; 6] = [
        AnalysisOp::ProjectValidate,
        AnalysisOp::Drc,
        AnalysisOp::Boundaries,
        AnalysisOp::Netlist,
        AnalysisOp::Patterns,
        AnalysisOp::Bom,
    ];

    /// Operations run when a project file is available.
    pub const PROJECT_SET: [AnalysisOp; 6] = Self::ALL;

    /// Operations run against a lone schematic.
    pub const SCHEMATIC_SET: [AnalysisOp; 2] = [AnalysisOp::Netlist, AnalysisOp::Patterns];

    pub fn key(&self) -> &'static str {
        match self {
            AnalysisOp::ProjectValidate => "project-validate",
            AnalysisOp::Drc => "drc",
            AnalysisOp::Boundaries => "boundaries",
            AnalysisOp::Netlist => "netlist",
            AnalysisOp::Patterns => "patterns",
            AnalysisOp::Bom => "bom",
        }
    }

    /// Engine tool name used for this operation against the given target.
    pub fn tool_name(&self, target: &AnalysisTarget) -> &'static str {
        let schematic = matches!(target, AnalysisTarget::Schematic(_));
        match self {
            AnalysisOp::ProjectValidate => "validate_project",
            AnalysisOp::Drc => "run_drc_check",
            AnalysisOp::Boundaries => "validate_project_boundaries",
            AnalysisOp::Netlist if schematic => "extract_schematic_netlist",
            AnalysisOp::Netlist => "extract_project_netlist",
            AnalysisOp::Patterns if schematic => "identify_circuit_patterns",
            AnalysisOp::Patterns => "analyze_project_circuit_patterns",
            AnalysisOp::Bom => "analyze_bom",
        }
    }
}

impl fmt::Display for AnalysisOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of one analysis operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Ok { data: Value },
    Failed { reason: String },
    Skipped { reason: String },
}

impl AnalysisOutcome {
    pub fn ok(data: Value) -> Self {
        AnalysisOutcome::Ok { data }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        AnalysisOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        AnalysisOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            AnalysisOutcome::Ok { data } => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AnalysisOutcome::Skipped { .. })
    }
}

/// What the operations are run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTarget {
    Project(PathBuf),
    Schematic(PathBuf),
}

impl AnalysisTarget {
    /// JSON arguments every tool call receives.
    pub fn arguments(&self) -> Value {
        match self {
            AnalysisTarget::Project(path) => {
                serde_json::json!({ "project_path": path.display().to_string() })
            }
            AnalysisTarget::Schematic(path) => {
                serde_json::json!({ "schematic_path": path.display().to_string() })
            }
        }
    }
}

pub const SKIP_NO_PROJECT: &str = "No project file supplied";
pub const SKIP_ENGINE_UNAVAILABLE: &str = "Analysis engine unavailable";

/// The operations to run for one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPlan {
    pub target: AnalysisTarget,
    pub ops: Vec<AnalysisOp>,
}

impl AnalysisPlan {
    /// Full set with a project file, reduced set with only a schematic,
    /// nothing otherwise.
    pub fn for_design(design: &DesignFiles) -> Option<Self> {
        if let Some(project) = &design.project {
            Some(Self {
                target: AnalysisTarget::Project(project.storage_path.clone()),
                ops: AnalysisOp::PROJECT_SET.to_vec(),
            })
        } else {
            design.schematic.as_ref().map(|schematic| Self {
                target: AnalysisTarget::Schematic(schematic.storage_path.clone()),
                ops: AnalysisOp::SCHEMATIC_SET.to_vec(),
            })
        }
    }

    pub fn includes(&self, op: AnalysisOp) -> bool {
        self.ops.contains(&op)
    }
}

/// Everything the orchestrator learned in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub mcp_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_error: Option<String>,
    pub results: BTreeMap<AnalysisOp, AnalysisOutcome>,
}

impl AnalysisReport {
    /// Report for a run where no operation executed. Every operation is
    /// marked skipped with the given reason unless it was never planned.
    pub fn skipped(plan: Option<&AnalysisPlan>, reason: &str) -> Self {
        let results = AnalysisOp::ALL
            .iter()
            .map(|op| {
                let planned = plan.map(|p| p.includes(*op)).unwrap_or(false);
                let why = if planned { reason } else { SKIP_NO_PROJECT };
                (*op, AnalysisOutcome::skipped(why))
            })
            .collect();
        Self {
            mcp_available: false,
            mcp_error: None,
            results,
        }
    }

    pub fn outcome(&self, op: AnalysisOp) -> Option<&AnalysisOutcome> {
        self.results.get(&op)
    }

    pub fn data(&self, op: AnalysisOp) -> Option<&Value> {
        self.outcome(op).and_then(AnalysisOutcome::data)
    }

    pub fn failure(&self, op: AnalysisOp) -> Option<&str> {
        self.outcome(op).and_then(AnalysisOutcome::failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::UploadedFile;

    #[test]
    fn test_plan_full_set_with_project() {
        let design = DesignFiles::classify(&[
            UploadedFile::new("demo.kicad_sch", "/u/demo.kicad_sch", 1),
            UploadedFile::new("demo.kicad_pro", "/u/demo.kicad_pro", 1),
        ]);
        let plan = AnalysisPlan::for_design(&design).unwrap();
        assert_eq!(plan.ops.len(), 6);
        assert_eq!(plan.target, AnalysisTarget::Project(PathBuf::from("/u/demo.kicad_pro")));
    }

    #[test]
    fn test_plan_reduced_set_with_schematic_only() {
        let design = DesignFiles::classify(&[UploadedFile::new("a.kicad_sch", "/u/a.kicad_sch", 1)]);
        let plan = AnalysisPlan::for_design(&design).unwrap();
        assert_eq!(plan.ops, vec![AnalysisOp::Netlist, AnalysisOp::Patterns]);
        assert_eq!(
            AnalysisOp::Netlist.tool_name(&plan.target),
            "extract_schematic_netlist"
        );
        assert_eq!(
            AnalysisOp::Patterns.tool_name(&plan.target),
            "identify_circuit_patterns"
        );
    }

    #[test]
    fn test_plan_none_for_board_only() {
        let design = DesignFiles::classify(&[UploadedFile::new("a.kicad_pcb", "/u/a.kicad_pcb", 1)]);
        assert!(AnalysisPlan::for_design(&design).is_none());
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(AnalysisOutcome::failed("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "boom"}));
    }

    #[test]
    fn test_skipped_report_distinguishes_unplanned() {
        let design = DesignFiles::classify(&[UploadedFile::new("a.kicad_sch", "/u/a.kicad_sch", 1)]);
        let plan = AnalysisPlan::for_design(&design).unwrap();
        let report = AnalysisReport::skipped(Some(&plan), SKIP_ENGINE_UNAVAILABLE);
        assert_eq!(
            report.outcome(AnalysisOp::Netlist),
            Some(&AnalysisOutcome::skipped(SKIP_ENGINE_UNAVAILABLE))
        );
        assert_eq!(
            report.outcome(AnalysisOp::Drc),
            Some(&AnalysisOutcome::skipped(SKIP_NO_PROJECT))
        );
    }
}
