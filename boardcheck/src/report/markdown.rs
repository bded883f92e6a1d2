//! Markdown artifact rendering.

use serde_json::Value;

use crate::analysis::{AnalysisOp, AnalysisOutcome};
use crate::firmware::{ComponentDescription, FirmwarePlan};
use crate::planner::PrdSummary;
use crate::report::{ReportInput, MAX_BOUNDARY_ISSUES, MAX_COMPONENT_DIGEST};

fn count_text(count: Option<u64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// One-line description of an issue record that may be text or an object.
fn describe_entry(entry: &Value) -> String {
    match entry {
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            if let Some(message) = entry.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            let subject = ["component", "reference"]
                .iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_str));
            let detail = ["issue", "type", "description"]
                .iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_str));
            match (subject, detail) {
                (Some(s), Some(d)) => format!("{}: {}", s, d),
                (Some(s), None) => s.to_string(),
                (None, Some(d)) => d.to_string(),
                (None, None) => entry.to_string(),
            }
        }
        other => other.to_string(),
    }
}

fn push_unavailable(lines: &mut Vec<String>, label: &str, outcome: Option<&AnalysisOutcome>) {
    match outcome {
        Some(AnalysisOutcome::Failed { reason }) => lines.push(format!("{} failed: {}", label, reason)),
        Some(AnalysisOutcome::Skipped { reason }) => {
            lines.push(format!("{} skipped: {}", label, reason))
        }
        _ => lines.push(format!("{} produced no data.", label)),
    }
}

fn push_plan_phases(lines: &mut Vec<String>, plan: &FirmwarePlan, heading: &str, checkbox: bool) {
    for phase in &plan.phases {
        lines.push(format!("{} {}", heading, phase.phase_name));
        for task in &phase.tasks {
            if checkbox {
                lines.push(format!("- [ ] {}", task));
            } else {
                lines.push(format!("- {}", task));
            }
        }
        lines.push(String::new());
    }
}

/// Full validation report (`{id}_report.md`).
pub fn render_report(input: &ReportInput<'_>) -> String {
    let summary = input.summary;
    let counts = &summary.counts;
    let mut lines = vec![
        "# PCB Validation Report".to_string(),
        String::new(),
        format!("**Validation ID:** {}", summary.validation_id),
        format!("**Status:** {}", summary.status.as_str().to_uppercase()),
        String::new(),
        "## Summary".to_string(),
        format!("- Components: {}", count_text(counts.components)),
        format!("- Nets: {}", count_text(counts.nets)),
        format!("- DRC violations: {}", count_text(counts.drc_violations)),
        format!("- Boundary issues: {}", count_text(counts.boundary_issues)),
        format!("- Circuit patterns: {}", count_text(counts.patterns)),
        String::new(),
        "### Notes".to_string(),
    ];
    if summary.notes.is_empty() {
        lines.push("- None".to_string());
    } else {
        lines.extend(summary.notes.iter().map(|n| format!("- {}", n)));
    }
    lines.push(String::new());

    // Project metadata
    let project = input.project;
    lines.push("## Project".to_string());
    lines.push(format!(
        "- Name: {}",
        project.name.as_deref().unwrap_or("(no project file)")
    ));
    lines.push(format!(
        "- Analysis engine: {}",
        if input.analysis.mcp_available {
            "available"
        } else {
            "unavailable"
        }
    ));
    lines.push(format!("- Uploaded files: {}", project.files.len()));
    for file in &project.files {
        lines.push(format!("  - {} ({} bytes)", file.original_name, file.size_bytes));
    }
    lines.push(String::new());

    // Design rule check
    lines.push("## Design Rule Check".to_string());
    let drc = input.analysis.outcome(AnalysisOp::Drc);
    match drc.and_then(AnalysisOutcome::data) {
        Some(data) => {
            lines.push(format!(
                "- Total violations: {}",
                count_text(counts.drc_violations)
            ));
            if let Some(categories) = data.get("violation_categories").and_then(Value::as_object) {
                for (category, count) in categories {
                    lines.push(format!("  - {}: {}", category, count));
                }
            }
        }
        None => push_unavailable(&mut lines, "DRC", drc),
    }
    lines.push(String::new());

    // Board boundaries
    lines.push("## Board Boundaries".to_string());
    let boundaries = input.analysis.outcome(AnalysisOp::Boundaries);
    match boundaries.and_then(AnalysisOutcome::data) {
        Some(data) => {
            lines.push(format!(
                "- Out-of-bounds components: {}",
                count_text(counts.boundary_issues)
            ));
            let issues = ["issues", "violations"]
                .iter()
                .find_map(|key| data.get(*key).and_then(Value::as_array))
                .cloned()
                .unwrap_or_default();
            for issue in issues.iter().take(MAX_BOUNDARY_ISSUES) {
                lines.push(format!("  - {}", describe_entry(issue)));
            }
            if issues.len() > MAX_BOUNDARY_ISSUES {
                lines.push(format!(
                    "  - ... {} more issues not shown",
                    issues.len() - MAX_BOUNDARY_ISSUES
                ));
            }
        }
        None => push_unavailable(&mut lines, "Boundary validation", boundaries),
    }
    lines.push(String::new());

    // Circuit patterns
    lines.push("## Circuit Patterns".to_string());
    if input.patterns.counts.is_empty() {
        lines.push("- No circuit patterns recognized".to_string());
    } else {
        for (category, count) in &input.patterns.counts {
            lines.push(format!("- {}: {}", category.replace('_', " "), count));
        }
    }
    lines.push(String::new());

    // Firmware plan
    lines.push("## Firmware Plan".to_string());
    lines.push(input.plan.overview.clone());
    lines.push(String::new());
    push_plan_phases(&mut lines, input.plan, "###", true);

    // Component digest
    lines.push("## Components".to_string());
    if input.components.is_empty() {
        lines.push("No components extracted.".to_string());
    } else {
        lines.push("| Reference | Value | Category |".to_string());
        lines.push("|---|---|---|".to_string());
        for c in input.components.iter().take(MAX_COMPONENT_DIGEST) {
            lines.push(format!("| {} | {} | {} |", c.reference, c.value, c.category));
        }
        if input.components.len() > MAX_COMPONENT_DIGEST {
            lines.push(String::new());
            lines.push(format!(
                "_... {} more components not shown_",
                input.components.len() - MAX_COMPONENT_DIGEST
            ));
        }
    }

    finish(lines)
}

/// Standalone firmware plan (`{id}_firmware_plan.md`).
pub fn render_firmware_plan(plan: &FirmwarePlan) -> String {
    let mut lines = vec![
        "# Firmware Implementation Plan".to_string(),
        String::new(),
        plan.overview.clone(),
        String::new(),
    ];
    push_plan_phases(&mut lines, plan, "##", false);

    if !plan.per_component.is_empty() {
        lines.push("## Per-Component Tasks".to_string());
        for item in &plan.per_component {
            lines.push(format!("### {} ({})", item.reference, item.role));
            lines.extend(item.tasks.iter().map(|t| format!("- {}", t)));
            lines.push(String::new());
        }
    }

    finish(lines)
}

/// Component reference (`{id}_components.md`), one section per component.
pub fn render_components(components: &[ComponentDescription]) -> String {
    let mut lines = vec![
        "# Component Reference".to_string(),
        String::new(),
        format!("{} components.", components.len()),
        String::new(),
    ];
    for c in components {
        lines.push(format!("## {} ({})", c.reference, c.category));
        lines.push(format!("- Value: {}", non_empty(&c.value)));
        lines.push(format!("- Footprint: {}", non_empty(&c.footprint)));
        lines.push(format!("- Library: {}", non_empty(&c.library_id)));
        lines.push(String::new());
        lines.push(c.description.clone());
        lines.push(String::new());
        if !c.firmware_tasks.is_empty() {
            lines.push("### Firmware Tasks".to_string());
            lines.extend(c.firmware_tasks.iter().map(|t| format!("- {}", t)));
            lines.push(String::new());
        }
    }
    finish(lines)
}

fn non_empty(s: &str) -> &str {
    if s.trim().is_empty() {
        "Unknown"
    } else {
        s
    }
}

/// PRD summary (`{id}_prd.md`) produced in planning-engine mode.
pub fn render_prd(prd: &PrdSummary) -> String {
    let mut lines = vec![
        "# PRD Summary".to_string(),
        String::new(),
        prd.product_brief.clone(),
        String::new(),
    ];
    let sections = [
        ("Functional Requirements", &prd.functional_requirements),
        ("Non-Functional Requirements", &prd.nonfunctional_requirements),
        ("Risks", &prd.risks),
        ("Milestones", &prd.milestones),
    ];
    for (title, items) in sections {
        lines.push(format!("## {}", title));
        if items.is_empty() {
            lines.push("- (none provided)".to_string());
        } else {
            lines.extend(items.iter().map(|i| format!("- {}", i)));
        }
        lines.push(String::new());
    }
    finish(lines)
}
