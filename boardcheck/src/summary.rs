//! Status & Notes Aggregator
//!
//! Reduces the per-operation outcomes of one run into a single status,
//! a flat list of advisory notes and a set of nullable counts. Pure
//! function of its inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{AnalysisOp, AnalysisReport, NetlistData, PatternsByCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Issues,
    Review,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pass => "pass",
            ValidationStatus::Issues => "issues",
            ValidationStatus::Review => "review",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts are `None` when the source operation failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub components: Option<u64>,
    pub nets: Option<u64>,
    pub drc_violations: Option<u64>,
    pub boundary_issues: Option<u64>,
    pub patterns: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub validation_id: String,
    pub status: ValidationStatus,
    pub notes: Vec<String>,
    pub counts: SummaryCounts,
}

/// First match wins: known-clean DRC with clean-or-unknown boundaries is a
/// pass; any known violation is an issue; anything else needs review.
pub fn compute_status(drc_violations: Option<u64>, boundary_issues: Option<u64>) -> ValidationStatus {
    match (drc_violations, boundary_issues) {
        (Some(0), None | Some(0)) => ValidationStatus::Pass,
        (Some(d), _) if d > 0 => ValidationStatus::Issues,
        (_, Some(b)) if b > 0 => ValidationStatus::Issues,
        _ => ValidationStatus::Review,
    }
}

pub fn drc_violation_count(data: &Value) -> Option<u64> {
    data.get("total_violations")
        .and_then(Value::as_u64)
        .or_else(|| array_len(data, &["violations"]))
}

pub fn boundary_issue_count(data: &Value) -> Option<u64> {
    data.get("out_of_bounds_count")
        .and_then(Value::as_u64)
        .or_else(|| array_len(data, &["issues", "violations"]))
}

fn array_len(data: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .map(|items| items.len() as u64)
}

/// Issues listed by a project validation that returned `valid: false`.
pub fn project_validation_issues(data: &Value) -> Option<Vec<String>> {
    if data.get("valid").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let issues = data
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();
    Some(issues)
}

/// Build the run summary.
///
/// `classified_components` is the number of components the classifier
/// saw; it stands in for the component count when the netlist operation
/// succeeded without reporting one.
pub fn aggregate(
    validation_id: &str,
    report: &AnalysisReport,
    has_project: bool,
    classified_components: usize,
) -> ValidationSummary {
    let netlist = report.data(AnalysisOp::Netlist).map(NetlistData::from_value);
    let counts = SummaryCounts {
        components: netlist
            .as_ref()
            .map(|n| n.reported_components.unwrap_or(classified_components as u64)),
        nets: netlist.as_ref().and_then(|n| n.net_count),
        drc_violations: report.data(AnalysisOp::Drc).and_then(drc_violation_count),
        boundary_issues: report
            .data(AnalysisOp::Boundaries)
            .and_then(boundary_issue_count),
        patterns: report
            .data(AnalysisOp::Patterns)
            .map(|data| PatternsByCategory::from_value(data).total() as u64),
    };

    let mut notes = Vec::new();
    if let Some(reason) = report.failure(AnalysisOp::Drc) {
        notes.push(format!("DRC check failed: {}", reason));
    }
    if let Some(reason) = report.failure(AnalysisOp::Boundaries) {
        notes.push(format!("Boundary validation failed: {}", reason));
    }
    if !has_project {
        notes.push(
            "No .kicad_pro project file supplied; DRC and boundary checks were skipped."
                .to_string(),
        );
    }
    if let Some(issues) = report
        .data(AnalysisOp::ProjectValidate)
        .and_then(project_validation_issues)
    {
        if issues.is_empty() {
            notes.push("Project validation reported the project as invalid.".to_string());
        } else {
            notes.push(format!("Project validation issues: {}", issues.join("; ")));
        }
    }
    if let Some(reason) = &report.mcp_error {
        notes.push(format!("Analysis engine unavailable: {}", reason));
    }

    ValidationSummary {
        validation_id: validation_id.to_string(),
        status: compute_status(counts.drc_violations, counts.boundary_issues),
        notes,
        counts,
    }
}
