//! Pipeline driver shared by the CLI and any other front end.
//!
//! One call to [`Pipeline::run`] is one validation run: classify the upload,
//! drive the analysis engine, derive the firmware plan and summary, render
//! and persist the artifacts. Runs share no mutable state.

use serde::Serialize;
use serde_json::{json, Value};

use crate::analysis::{AnalysisOp, AnalysisPlan, AnalysisReport, NetlistData, Orchestrator, PatternsByCategory};
use crate::artifacts::{ArtifactFiles, ArtifactKind, ArtifactStore, PlanningArtifactFiles};
use crate::config::Config;
use crate::engine::{EngineConnector, StdioEngine};
use crate::files::{DesignFiles, ProjectInfo, UploadedFile};
use crate::firmware::{describe_components, synthesize, ComponentDescription, FirmwarePlan};
use crate::planner::{
    collect_payload, normalize_response, AgentPlanner, FileMetadata, PlanningEngine,
    PlanningRequest, PrdSummary,
};
use crate::report::{
    render_components, render_firmware_plan, render_prd, render_report, render_summary_json,
    ReportInput,
};
use crate::summary::{aggregate, ValidationSummary};

#[derive(Debug, thiserror::Error)]
pub enum BoardCheckError {
    #[error("No KiCad project, schematic, or PCB file found in upload.")]
    NoDesignFile,
    #[error("Invalid validation id: {0}")]
    InvalidId(String),
    #[error("Failed to write artifact {name}: {source}")]
    ArtifactWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

impl BoardCheckError {
    /// Short machine-readable reason carried in failure responses.
    pub fn reason(&self) -> &'static str {
        match self {
            BoardCheckError::NoDesignFile => "no_design_file",
            BoardCheckError::InvalidId(_) => "invalid_validation_id",
            BoardCheckError::ArtifactWrite { .. } => "artifact_write_failed",
            BoardCheckError::Config(_) => "config_invalid",
            BoardCheckError::Other(_) => "internal",
        }
    }

    /// Message safe to show the caller. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            BoardCheckError::ArtifactWrite { name, .. } => {
                format!("Failed to write artifact {}", name)
            }
            BoardCheckError::Other(_) => "Validation failed due to an internal error.".to_string(),
            other => other.to_string(),
        }
    }

    /// `{success: false, error, reason}`
    pub fn to_response(&self) -> Value {
        json!({
            "success": false,
            "error": self.user_message(),
            "reason": self.reason(),
        })
    }
}

/// Structured result of an analysis run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub success: bool,
    pub validation_id: String,
    pub project: ProjectInfo,
    pub summary: ValidationSummary,
    pub analysis: AnalysisReport,
    pub firmware_plan: FirmwarePlan,
    pub components: Vec<ComponentDescription>,
    pub files: ArtifactFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningSummary {
    pub validation_id: String,
    pub notes: Vec<String>,
    pub counts: FileCounts,
}

/// Structured result of a planning run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResult {
    pub success: bool,
    pub validation_id: String,
    pub project: ProjectInfo,
    pub summary: PlanningSummary,
    pub firmware_plan: FirmwarePlan,
    pub prd: PrdSummary,
    pub files: PlanningArtifactFiles,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanningInput<'a> {
    metadata: &'a [FileMetadata],
    total_chars: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanningSummaryArtifact<'a> {
    summary: &'a PlanningSummary,
    firmware_plan: &'a FirmwarePlan,
    prd: &'a PrdSummary,
    input: PlanningInput<'a>,
}

/// Serialize a run outcome into the response shape handed to front ends.
pub fn to_response<T: Serialize>(result: &Result<T, BoardCheckError>) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or_else(|e| {
            BoardCheckError::Other(e.to_string()).to_response()
        }),
        Err(e) => e.to_response(),
    }
}

/// `validation_<unix-millis>_<8 hex chars>`
pub fn generate_validation_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("validation_{}_{}", millis, &suffix[..8])
}

/// Reuse a caller-supplied id or mint a new one. Ids become part of
/// artifact file names, so only `[A-Za-z0-9_.-]` is accepted.
pub fn resolve_validation_id(supplied: Option<&str>) -> Result<String, BoardCheckError> {
    match supplied.map(str::trim).filter(|id| !id.is_empty()) {
        None => Ok(generate_validation_id()),
        Some(id) => {
            let valid = !id.starts_with('.')
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
            if valid {
                Ok(id.to_string())
            } else {
                Err(BoardCheckError::InvalidId(id.to_string()))
            }
        }
    }
}

/// Load configuration, reporting problems as `config_invalid`.
pub fn load_config(path: Option<&std::path::Path>) -> Result<Config, BoardCheckError> {
    Config::load(path).map_err(|e| BoardCheckError::Config(format!("{:#}", e)))
}

pub struct Pipeline {
    config: Config,
    connector: Box<dyn EngineConnector>,
    planner: Box<dyn PlanningEngine>,
    store: ArtifactStore,
}

impl Pipeline {
    /// Pipeline backed by the subprocess engine and planning agent.
    pub fn new(config: Config) -> Self {
        let connector = Box::new(StdioEngine::new(config.engine.clone()));
        let planner = Box::new(AgentPlanner::new(config.planner.clone()));
        Self::with_engines(config, connector, planner)
    }

    pub fn with_engines(
        config: Config,
        connector: Box<dyn EngineConnector>,
        planner: Box<dyn PlanningEngine>,
    ) -> Self {
        let store = ArtifactStore::new(config.output.dir.clone());
        Self {
            config,
            connector,
            planner,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    fn classify_upload(files: &[UploadedFile]) -> Result<DesignFiles, BoardCheckError> {
        let design = DesignFiles::classify(files);
        if !design.has_design_file() {
            tracing::warn!("Upload of {} file(s) has no KiCad design file", files.len());
            return Err(BoardCheckError::NoDesignFile);
        }
        Ok(design)
    }

    async fn persist(&self, artifacts: &[(&str, &str)]) -> Result<(), BoardCheckError> {
        self.store
            .write_set(artifacts)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::error!("Failed to write artifact {}: {}", e.name, e.source);
                BoardCheckError::ArtifactWrite {
                    name: e.name,
                    source: e.source,
                }
            })
    }

    /// Analysis-engine run.
    pub async fn run(
        &self,
        validation_id: Option<&str>,
        files: &[UploadedFile],
    ) -> Result<PipelineResult, BoardCheckError> {
        let design = Self::classify_upload(files)?;
        let validation_id = resolve_validation_id(validation_id)?;
        tracing::info!("Starting validation {} ({} files)", validation_id, files.len());

        let plan = AnalysisPlan::for_design(&design);
        match &plan {
            Some(plan) => tracing::info!(
                "Analysis plan: {} operation(s) on {:?}",
                plan.ops.len(),
                plan.target
            ),
            None => tracing::info!("No analysis target; board file only"),
        }

        let orchestrator = Orchestrator::new(self.connector.as_ref(), self.config.engine.call_timeout());
        let analysis = orchestrator.run(plan.as_ref()).await;

        let netlist = analysis
            .data(AnalysisOp::Netlist)
            .map(NetlistData::from_value)
            .unwrap_or_default();
        let patterns = analysis
            .data(AnalysisOp::Patterns)
            .map(PatternsByCategory::from_value)
            .unwrap_or_default();

        let components = describe_components(&netlist.components, &patterns);
        let firmware_plan = synthesize(&components, &patterns);
        let summary = aggregate(
            &validation_id,
            &analysis,
            design.project.is_some(),
            components.len(),
        );
        let project = design.project_info();

        let input = ReportInput {
            summary: &summary,
            project: &project,
            analysis: &analysis,
            patterns: &patterns,
            plan: &firmware_plan,
            components: &components,
        };
        let report_md = render_report(&input);
        let plan_md = render_firmware_plan(&firmware_plan);
        let components_md = render_components(&components);
        let summary_json = render_summary_json(&input)
            .map_err(|e| BoardCheckError::Other(format!("summary serialization: {}", e)))?;

        let names = ArtifactFiles::for_run(&validation_id);
        self.persist(&[
            (names.report.as_str(), report_md.as_str()),
            (names.firmware_plan.as_str(), plan_md.as_str()),
            (names.components.as_str(), components_md.as_str()),
            (names.summary.as_str(), summary_json.as_str()),
        ])
        .await?;

        tracing::info!(
            "Validation {} finished with status {} ({} note(s))",
            validation_id,
            summary.status,
            summary.notes.len()
        );

        Ok(PipelineResult {
            success: true,
            validation_id,
            project,
            summary,
            analysis,
            firmware_plan,
            components,
            files: names,
        })
    }

    /// Planning-engine run.
    pub async fn run_planning(
        &self,
        validation_id: Option<&str>,
        files: &[UploadedFile],
    ) -> Result<PlanningResult, BoardCheckError> {
        let design = Self::classify_upload(files)?;
        let validation_id = resolve_validation_id(validation_id)?;
        tracing::info!(
            "Starting planning run {} ({} files) with {} planner",
            validation_id,
            files.len(),
            self.planner.name()
        );

        let limits = &self.config.planner;
        let payload = collect_payload(files, limits.max_file_chars, limits.max_total_chars).await;
        let truncated = payload.truncated_files.clone();
        let forwarded = payload.files.len();
        let metadata = payload.metadata.clone();
        let total_chars = payload.total_chars;

        let request = PlanningRequest::firmware(payload.into_context(&validation_id));
        let answer = match self.planner.plan(&request).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!("Planning engine failed: {}", e);
                None
            }
        };

        let normalized = normalize_response(answer.as_ref());
        let mut notes = normalized.notes;
        if answer.is_none() {
            notes.push("LLM agent unavailable; using a default firmware plan.".to_string());
        }
        if !truncated.is_empty() {
            notes.push(format!("Input truncated for: {}", truncated.join(", ")));
        }
        if forwarded == 0 {
            notes.push("No readable KiCad files were parsed for the LLM.".to_string());
        }

        let summary = PlanningSummary {
            validation_id: validation_id.clone(),
            notes,
            counts: FileCounts {
                files: files.len(),
                bytes: design.total_bytes(),
            },
        };
        let firmware_plan = normalized.firmware_plan;
        let prd = normalized.prd;

        let plan_md = render_firmware_plan(&firmware_plan);
        let prd_md = render_prd(&prd);
        let artifact = PlanningSummaryArtifact {
            summary: &summary,
            firmware_plan: &firmware_plan,
            prd: &prd,
            input: PlanningInput {
                metadata: &metadata,
                total_chars,
            },
        };
        let mut summary_json = serde_json::to_string_pretty(&artifact)
            .map_err(|e| BoardCheckError::Other(format!("summary serialization: {}", e)))?;
        summary_json.push('\n');

        let names = PlanningArtifactFiles::for_run(&validation_id);
        self.persist(&[
            (names.firmware_plan.as_str(), plan_md.as_str()),
            (names.prd.as_str(), prd_md.as_str()),
            (names.summary.as_str(), summary_json.as_str()),
        ])
        .await?;

        tracing::info!(
            "Planning run {} finished ({} note(s))",
            validation_id,
            summary.notes.len()
        );

        Ok(PlanningResult {
            success: true,
            validation_id,
            project: design.project_info(),
            summary,
            firmware_plan,
            prd,
            files: names,
        })
    }

    /// Absolute location of an artifact written by this pipeline.
    pub fn artifact_path(&self, kind: ArtifactKind, validation_id: &str) -> std::path::PathBuf {
        self.store.path_of(&kind.file_name(validation_id))
    }
}
