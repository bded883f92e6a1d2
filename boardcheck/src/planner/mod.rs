//! Planning Engine
//!
//! Alternate pipeline mode: instead of driving the analysis engine, the raw
//! text of the uploaded design files is handed to an external planning
//! agent which answers with a firmware plan and a PRD summary. Anything the
//! agent leaves out or gets wrong is replaced with fixed defaults, so a
//! planning run never fails because of the agent.

pub mod agent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::files::{file_ext, UploadedFile};
use crate::firmware::{ComponentTasks, FirmwarePlan, PlanPhase};

pub use agent::AgentPlanner;

/// Extensions whose contents are forwarded to the planning agent.
pub const INCLUDED_EXTENSIONS: [&str; 7] = [
    ".kicad_pro",
    ".kicad_pcb",
    ".kicad_sch",
    ".kicad_prl",
    ".kicad_sym",
    ".kicad_mod",
    ".csv",
];

pub const DEFAULT_OVERVIEW: &str =
    "Generate a firmware implementation plan based on the uploaded KiCad files.";
pub const DEFAULT_PRODUCT_BRIEF: &str =
    "Define firmware scope, requirements, and delivery plan for this PCB.";

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Failed to run planning agent: {0}")]
    Io(#[from] std::io::Error),
    #[error("Planning agent timed out after {0} seconds")]
    Timeout(u64),
    #[error("Planning agent exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("Planning agent returned invalid JSON")]
    InvalidJson,
    #[error("Failed to encode planning request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Common interface for planning backends.
#[async_trait]
pub trait PlanningEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Send one request and return the agent's raw JSON answer.
    async fn plan(&self, request: &PlanningRequest) -> Result<Value, PlannerError>;
}

/// Metadata for every uploaded file, forwarded or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub filename: String,
    pub ext: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadFile {
    pub name: String,
    pub ext: String,
    pub size: u64,
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningContext {
    pub validation_id: String,
    pub metadata: Vec<FileMetadata>,
    pub total_chars: usize,
    pub files: Vec<PayloadFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningRequest {
    pub mode: String,
    pub context: PlanningContext,
}

impl PlanningRequest {
    pub fn firmware(context: PlanningContext) -> Self {
        Self {
            mode: "firmware".to_string(),
            context,
        }
    }
}

/// File contents gathered for one planning request.
#[derive(Debug, Clone, Default)]
pub struct CollectedPayload {
    pub metadata: Vec<FileMetadata>,
    pub files: Vec<PayloadFile>,
    pub total_chars: usize,
    pub truncated_files: Vec<String>,
}

impl CollectedPayload {
    pub fn into_context(self, validation_id: &str) -> PlanningContext {
        PlanningContext {
            validation_id: validation_id.to_string(),
            metadata: self.metadata,
            total_chars: self.total_chars,
            files: self.files,
        }
    }
}

/// Read the forwardable files under a per-file and a total character
/// budget. Files are visited in upload order; once the total budget is
/// spent, the remaining files are not read at all.
pub async fn collect_payload(
    files: &[UploadedFile],
    max_file_chars: usize,
    max_total_chars: usize,
) -> CollectedPayload {
    let metadata = files
        .iter()
        .map(|f| FileMetadata {
            name: f.original_name.clone(),
            filename: f
                .storage_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ext: f.extension(),
            size: f.size_bytes,
        })
        .collect();

    let mut payload = CollectedPayload {
        metadata,
        ..Default::default()
    };

    for file in files {
        let ext = file_ext(&file.original_name);
        if !INCLUDED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let remaining = max_total_chars.saturating_sub(payload.total_chars);
        if remaining == 0 {
            break;
        }
        let limit = max_file_chars.min(remaining);

        let bytes = match tokio::fs::read(&file.storage_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping unreadable upload {}: {}", file.original_name, e);
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let (content, truncated) = truncate_chars(&text, limit);

        payload.total_chars += content.chars().count();
        if truncated {
            payload.truncated_files.push(file.original_name.clone());
        }
        payload.files.push(PayloadFile {
            name: file.original_name.clone(),
            ext,
            size: file.size_bytes,
            content,
            truncated,
        });
    }

    payload
}

fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrdSummary {
    pub product_brief: String,
    pub functional_requirements: Vec<String>,
    pub nonfunctional_requirements: Vec<String>,
    pub risks: Vec<String>,
    pub milestones: Vec<String>,
}

impl Default for PrdSummary {
    fn default() -> Self {
        Self {
            product_brief: DEFAULT_PRODUCT_BRIEF.to_string(),
            functional_requirements: Vec::new(),
            nonfunctional_requirements: Vec::new(),
            risks: Vec::new(),
            milestones: Vec::new(),
        }
    }
}

pub fn default_firmware_plan() -> FirmwarePlan {
    FirmwarePlan {
        overview: DEFAULT_OVERVIEW.to_string(),
        phases: vec![
            PlanPhase::new(
                "Bring-up",
                vec![
                    "Power rails verification".to_string(),
                    "Clock configuration".to_string(),
                    "Basic GPIO smoke test".to_string(),
                ],
            ),
            PlanPhase::new(
                "Peripheral Enablement",
                vec![
                    "Bus initialization".to_string(),
                    "Driver bring-up".to_string(),
                    "Hardware validation".to_string(),
                ],
            ),
        ],
        per_component: Vec::new(),
    }
}

/// Agent answer after defaults have been filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPlan {
    pub firmware_plan: FirmwarePlan,
    pub prd: PrdSummary,
    pub notes: Vec<String>,
}

/// Fill every missing or malformed part of an agent answer with defaults.
pub fn normalize_response(response: Option<&Value>) -> NormalizedPlan {
    let empty = Value::Null;
    let response = response.unwrap_or(&empty);
    let firmware = response.get("firmware_plan").unwrap_or(&empty);
    let prd = response.get("prd_summary").unwrap_or(&empty);

    let default_plan = default_firmware_plan();
    let firmware_plan = FirmwarePlan {
        overview: non_empty_str(firmware.get("overview"))
            .unwrap_or(default_plan.overview),
        phases: match firmware.get("phases").and_then(Value::as_array) {
            Some(phases) => phases.iter().map(phase_from_value).collect(),
            None => default_plan.phases,
        },
        per_component: firmware
            .get("per_component")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(component_tasks_from_value).collect())
            .unwrap_or_default(),
    };

    let prd = PrdSummary {
        product_brief: non_empty_str(prd.get("product_brief"))
            .unwrap_or_else(|| DEFAULT_PRODUCT_BRIEF.to_string()),
        functional_requirements: string_list(prd.get("functional_requirements")),
        nonfunctional_requirements: string_list(prd.get("nonfunctional_requirements")),
        risks: string_list(prd.get("risks")),
        milestones: string_list(prd.get("milestones")),
    };

    NormalizedPlan {
        firmware_plan,
        prd,
        notes: string_list(response.get("notes")),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn first_str(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| non_empty_str(value.get(*key)))
        .unwrap_or_default()
}

/// Strings are kept as-is; other items are rendered as compact JSON.
fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn phase_from_value(value: &Value) -> PlanPhase {
    match value {
        Value::String(name) => PlanPhase::new(name.clone(), Vec::new()),
        _ => PlanPhase::new(
            first_str(value, &["phase", "phase_name", "name"]),
            string_list(value.get("tasks")),
        ),
    }
}

fn component_tasks_from_value(value: &Value) -> ComponentTasks {
    ComponentTasks {
        reference: first_str(value, &["reference", "component", "ref"]),
        role: first_str(value, &["role", "category"]),
        tasks: string_list(value.get("tasks")),
    }
}
