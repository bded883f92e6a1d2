//! Report Renderer
//!
//! Pure formatting of the aggregated run state into artifact text. Every
//! render function is a deterministic function of its inputs: maps are
//! ordered, nothing reads the clock, and JSON is emitted with a stable key
//! order.

pub mod markdown;

use serde::Serialize;

use crate::analysis::{AnalysisReport, PatternsByCategory};
use crate::files::ProjectInfo;
use crate::firmware::{ComponentDescription, FirmwarePlan};
use crate::summary::ValidationSummary;

pub use markdown::{render_components, render_firmware_plan, render_prd, render_report};

/// Maximum boundary issues listed in the full report.
pub const MAX_BOUNDARY_ISSUES: usize = 20;
/// Maximum components listed in the full report digest.
pub const MAX_COMPONENT_DIGEST: usize = 40;

/// Everything the renderers need for one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub summary: &'a ValidationSummary,
    pub project: &'a ProjectInfo,
    pub analysis: &'a AnalysisReport,
    pub patterns: &'a PatternsByCategory,
    pub plan: &'a FirmwarePlan,
    pub components: &'a [ComponentDescription],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryArtifact<'a> {
    summary: &'a ValidationSummary,
    project: &'a ProjectInfo,
    analysis: &'a AnalysisReport,
    firmware_plan: &'a FirmwarePlan,
    components: &'a [ComponentDescription],
}

/// Raw structured bundle written as `{id}_summary.json`.
pub fn render_summary_json(input: &ReportInput<'_>) -> Result<String, serde_json::Error> {
    let artifact = SummaryArtifact {
        summary: input.summary,
        project: input.project,
        analysis: input.analysis,
        firmware_plan: input.plan,
        components: input.components,
    };
    let mut text = serde_json::to_string_pretty(&artifact)?;
    text.push('\n');
    Ok(text)
}
