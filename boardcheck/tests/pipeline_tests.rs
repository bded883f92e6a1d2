//! Integration tests for the validation pipeline, driven by an in-memory
//! analysis engine and planning agent.

use async_trait::async_trait;
use boardcheck::analysis::SKIP_ENGINE_UNAVAILABLE;
use boardcheck::planner::{PlanningRequest, DEFAULT_OVERVIEW, DEFAULT_PRODUCT_BRIEF};
use boardcheck::prelude::*;
use boardcheck::{
    to_response, AnalysisOp, AnalysisOutcome, ComponentCategory, EngineConnector, EngineError,
    EngineSession, PlannerError, PlanningEngine,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

#[derive(Default)]
struct EngineLog {
    connects: AtomicUsize,
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

/// Answers tool calls from a fixed table. Unknown tools report an error.
struct FakeEngine {
    responses: HashMap<&'static str, String>,
    connect_error: Option<&'static str>,
    log: Arc<EngineLog>,
}

impl FakeEngine {
    fn new(responses: Vec<(&'static str, String)>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            connect_error: None,
            log: Arc::new(EngineLog::default()),
        }
    }

    fn unreachable(reason: &'static str) -> Self {
        Self {
            connect_error: Some(reason),
            ..Self::new(vec![])
        }
    }
}

struct FakeSession {
    responses: HashMap<&'static str, String>,
    log: Arc<EngineLog>,
}

#[async_trait]
impl EngineConnector for FakeEngine {
    async fn connect(&self) -> Result<Box<dyn EngineSession>, EngineError> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.connect_error {
            return Err(EngineError::Handshake(reason.to_string()));
        }
        Ok(Box::new(FakeSession {
            responses: self.responses.clone(),
            log: self.log.clone(),
        }))
    }
}

#[async_trait]
impl EngineSession for FakeSession {
    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<String, EngineError> {
        self.log.calls.lock().unwrap().push(name.to_string());
        self.responses
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::Tool(format!("{} is not available", name)))
    }

    async fn close(&self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns a canned answer, or fails when none is set.
struct FakePlanner {
    answer: Option<Value>,
    requests: Arc<Mutex<Vec<PlanningRequest>>>,
}

impl FakePlanner {
    fn new(answer: Option<Value>) -> Self {
        Self {
            answer,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl PlanningEngine for FakePlanner {
    fn name(&self) -> &str {
        "fake"
    }

    async fn plan(&self, request: &PlanningRequest) -> Result<Value, PlannerError> {
        self.requests.lock().unwrap().push(request.clone());
        self.answer.clone().ok_or(PlannerError::InvalidJson)
    }
}

fn pipeline_with(out: &Path, engine: FakeEngine, planner: FakePlanner) -> Pipeline {
    let mut config = Config::default();
    config.output.dir = out.to_path_buf();
    Pipeline::with_engines(config, Box::new(engine), Box::new(planner))
}

fn upload(name: &str) -> UploadedFile {
    UploadedFile::new(name, format!("/uploads/{}", name), 128)
}

fn read_artifact(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

fn schematic_engine() -> FakeEngine {
    FakeEngine::new(vec![
        ("extract_schematic_netlist", fixture("schematic_netlist.json")),
        ("identify_circuit_patterns", fixture("schematic_patterns.json")),
    ])
}

#[tokio::test]
async fn test_schematic_only_upload() {
    let out = tempfile::tempdir().unwrap();
    let engine = schematic_engine();
    let log = engine.log.clone();
    let pipeline = pipeline_with(out.path(), engine, FakePlanner::new(None));

    let result = pipeline
        .run(Some("run_a"), &[upload("main.kicad_sch")])
        .await
        .unwrap();

    assert_eq!(result.summary.status, ValidationStatus::Review);
    assert_eq!(
        result.firmware_plan.phase_names(),
        vec!["Board Bring-up", "MCU Bring-up"]
    );
    assert_eq!(result.firmware_plan.per_component.len(), 1);
    assert_eq!(result.firmware_plan.per_component[0].reference, "U1");
    assert_eq!(result.firmware_plan.per_component[0].tasks.len(), 4);

    let categories: Vec<_> = result
        .components
        .iter()
        .map(|c| (c.reference.as_str(), c.category))
        .collect();
    assert_eq!(
        categories,
        vec![
            ("R1", ComponentCategory::Resistor),
            ("U1", ComponentCategory::Microcontroller),
        ]
    );
    assert_eq!(result.summary.counts.components, Some(2));
    assert_eq!(result.summary.counts.nets, Some(5));
    assert_eq!(result.summary.counts.drc_violations, None);

    // Only the reduced operation set ran, on one session that was closed.
    let mut calls = log.calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec!["extract_schematic_netlist", "identify_circuit_patterns"]);
    assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    assert!(result.analysis.outcome(AnalysisOp::Drc).unwrap().is_skipped());

    let components_md = read_artifact(out.path(), "run_a_components.md");
    assert!(components_md.contains("## R1 (Resistor)"));
    assert!(components_md.contains("## U1 (Microcontroller)"));
}

#[tokio::test]
async fn test_clean_project_passes() {
    let out = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(vec![
        ("validate_project", fixture("project_valid.json")),
        ("run_drc_check", fixture("drc_clean.json")),
        ("validate_project_boundaries", fixture("boundaries_clean.json")),
    ]);
    let log = engine.log.clone();
    let pipeline = pipeline_with(out.path(), engine, FakePlanner::new(None));

    let result = pipeline
        .run(None, &[upload("demo.kicad_pro"), upload("demo.kicad_pcb")])
        .await
        .unwrap();

    assert_eq!(result.summary.status, ValidationStatus::Pass);
    assert!(result.summary.notes.is_empty(), "notes: {:?}", result.summary.notes);
    assert_eq!(result.project.name.as_deref(), Some("demo"));
    assert!(result.analysis.mcp_available);
    assert_eq!(log.calls.lock().unwrap().len(), 6);

    // Netlist, patterns and BOM were unavailable but never abort the run.
    assert!(matches!(
        result.analysis.outcome(AnalysisOp::Bom),
        Some(AnalysisOutcome::Failed { .. })
    ));
    assert_eq!(result.summary.counts.components, None);
    assert!(result.validation_id.starts_with("validation_"));
}

#[tokio::test]
async fn test_unrecognized_upload_fails_fast() {
    let out = tempfile::tempdir().unwrap();
    let artifacts = out.path().join("generated");
    let engine = schematic_engine();
    let log = engine.log.clone();
    let pipeline = pipeline_with(&artifacts, engine, FakePlanner::new(None));

    let result = pipeline.run(None, &[upload("notes.txt")]).await;

    let err = result.as_ref().err().unwrap();
    assert_eq!(err.reason(), "no_design_file");
    assert_eq!(log.connects.load(Ordering::SeqCst), 0);
    assert!(!artifacts.exists());

    let response = to_response(&result);
    assert_eq!(response["success"], false);
    assert_eq!(
        response["error"],
        "No KiCad project, schematic, or PCB file found in upload."
    );
}

#[tokio::test]
async fn test_engine_unavailable_still_writes_artifacts() {
    let out = tempfile::tempdir().unwrap();
    let engine = FakeEngine::unreachable("connection refused");
    let pipeline = pipeline_with(out.path(), engine, FakePlanner::new(None));

    let result = pipeline
        .run(Some("run_d"), &[upload("demo.kicad_pro")])
        .await
        .unwrap();

    assert!(!result.analysis.mcp_available);
    assert_eq!(result.summary.status, ValidationStatus::Review);
    assert!(result
        .summary
        .notes
        .iter()
        .any(|n| n.contains("connection refused")));
    assert_eq!(result.summary.counts, Default::default());
    for op in AnalysisOp::ALL {
        assert_eq!(
            result.analysis.outcome(op),
            Some(&AnalysisOutcome::skipped(SKIP_ENGINE_UNAVAILABLE))
        );
    }

    for name in [
        "run_d_report.md",
        "run_d_firmware_plan.md",
        "run_d_components.md",
        "run_d_summary.json",
    ] {
        assert!(out.path().join(name).is_file(), "missing {}", name);
    }
    let summary: Value = serde_json::from_str(&read_artifact(out.path(), "run_d_summary.json")).unwrap();
    assert_eq!(summary["analysis"]["mcpAvailable"], false);
    assert_eq!(summary["summary"]["status"], "review");
}

#[tokio::test]
async fn test_drc_failure_is_a_note() {
    let out = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(vec![
        (
            "run_drc_check",
            r#"{"success": false, "error": "kicad-cli not found"}"#.to_string(),
        ),
        ("validate_project_boundaries", r#"{"out_of_bounds_count": 2}"#.to_string()),
    ]);
    let pipeline = pipeline_with(out.path(), engine, FakePlanner::new(None));

    let result = pipeline
        .run(None, &[upload("demo.kicad_pro")])
        .await
        .unwrap();

    assert_eq!(result.summary.status, ValidationStatus::Issues);
    assert_eq!(result.summary.notes[0], "DRC check failed: kicad-cli not found");
    assert_eq!(result.summary.counts.boundary_issues, Some(2));
}

#[tokio::test]
async fn test_artifacts_are_identical_across_runs() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(out.path(), schematic_engine(), FakePlanner::new(None));
    let files = [upload("main.kicad_sch")];

    pipeline.run(Some("first"), &files).await.unwrap();
    pipeline.run(Some("second"), &files).await.unwrap();

    assert_eq!(
        read_artifact(out.path(), "first_components.md"),
        read_artifact(out.path(), "second_components.md")
    );
    assert_eq!(
        read_artifact(out.path(), "first_firmware_plan.md"),
        read_artifact(out.path(), "second_firmware_plan.md")
    );
    assert_eq!(
        read_artifact(out.path(), "first_report.md").replace("first", "second"),
        read_artifact(out.path(), "second_report.md")
    );
}

#[tokio::test]
async fn test_reused_id_does_not_overwrite() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(out.path(), schematic_engine(), FakePlanner::new(None));
    let files = [upload("main.kicad_sch")];

    pipeline.run(Some("same"), &files).await.unwrap();
    let before = read_artifact(out.path(), "same_report.md");

    let err = pipeline.run(Some("same"), &files).await.unwrap_err();
    assert_eq!(err.reason(), "artifact_write_failed");
    assert_eq!(read_artifact(out.path(), "same_report.md"), before);
}

#[tokio::test]
async fn test_failed_persist_leaves_no_partial_run() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(out.path(), schematic_engine(), FakePlanner::new(None));
    let files = [upload("main.kicad_sch")];
    let blocker = out.path().join("p_components.md");
    std::fs::create_dir(&blocker).unwrap();

    let err = pipeline.run(Some("p"), &files).await.unwrap_err();
    assert_eq!(err.reason(), "artifact_write_failed");
    let left: Vec<_> = std::fs::read_dir(out.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(left, vec!["p_components.md".to_string()]);

    std::fs::remove_dir(&blocker).unwrap();
    let result = pipeline.run(Some("p"), &files).await.unwrap();
    assert!(out.path().join(&result.files.report).is_file());
    assert!(out.path().join(&result.files.components).is_file());
}

#[tokio::test]
async fn test_success_response_shape() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(out.path(), schematic_engine(), FakePlanner::new(None));

    let result = pipeline.run(Some("resp"), &[upload("main.kicad_sch")]).await;
    let response = to_response(&result);

    assert_eq!(response["success"], true);
    assert_eq!(response["validationId"], "resp");
    assert_eq!(response["files"]["report"], "resp_report.md");
    assert_eq!(response["files"]["firmwarePlan"], "resp_firmware_plan.md");
    assert_eq!(response["analysis"]["results"]["netlist"]["status"], "ok");
    assert_eq!(response["analysis"]["results"]["drc"]["status"], "skipped");
    assert_eq!(response["firmwarePlan"]["perComponent"][0]["reference"], "U1");
}

fn write_upload(dir: &Path, name: &str, content: &str) -> UploadedFile {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    UploadedFile::new(name, path, content.len() as u64)
}

#[tokio::test]
async fn test_planning_uses_agent_answer() {
    let uploads = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let answer = serde_json::json!({
        "firmware_plan": {
            "overview": "Bring up the sensor hub.",
            "phases": [{"phase": "Init", "tasks": ["Clock tree"]}],
            "per_component": [{"reference": "U1", "role": "MCU", "tasks": ["Flash bootloader"]}]
        },
        "prd_summary": {"product_brief": "Sensor hub", "risks": ["Long lead times"]},
        "notes": ["Schematic only"]
    });
    let planner = FakePlanner::new(Some(answer));
    let requests = planner.requests.clone();
    let pipeline = pipeline_with(out.path(), FakeEngine::new(vec![]), planner);

    let files = vec![
        write_upload(uploads.path(), "hub.kicad_sch", "(kicad_sch (version 20231120))"),
        write_upload(uploads.path(), "readme.txt", "ignored"),
    ];
    let result = pipeline.run_planning(Some("plan_1"), &files).await.unwrap();

    assert_eq!(result.firmware_plan.overview, "Bring up the sensor hub.");
    assert_eq!(result.prd.product_brief, "Sensor hub");
    assert_eq!(result.summary.notes, vec!["Schematic only"]);
    assert_eq!(result.summary.counts.files, 2);

    let sent = requests.lock().unwrap();
    assert_eq!(sent[0].mode, "firmware");
    assert_eq!(sent[0].context.validation_id, "plan_1");
    assert_eq!(sent[0].context.metadata.len(), 2);
    assert_eq!(sent[0].context.files.len(), 1);

    let prd = read_artifact(out.path(), "plan_1_prd.md");
    assert!(prd.contains("## Risks\n- Long lead times"));
    assert!(prd.contains("## Milestones\n- (none provided)"));
    let plan = read_artifact(out.path(), "plan_1_firmware_plan.md");
    assert!(plan.contains("### U1 (MCU)\n- Flash bootloader"));
    let summary: Value = serde_json::from_str(&read_artifact(out.path(), "plan_1_summary.json")).unwrap();
    assert_eq!(summary["input"]["totalChars"], 30);
}

#[tokio::test]
async fn test_planning_falls_back_to_defaults() {
    let uploads = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.output.dir = out.path().to_path_buf();
    config.planner.max_file_chars = 4;
    let pipeline = Pipeline::with_engines(
        config,
        Box::new(FakeEngine::new(vec![])),
        Box::new(FakePlanner::new(None)),
    );

    let files = vec![write_upload(uploads.path(), "board.kicad_pcb", "(kicad_pcb)")];
    let result = pipeline.run_planning(None, &files).await.unwrap();

    assert_eq!(result.firmware_plan.overview, DEFAULT_OVERVIEW);
    assert_eq!(
        result.firmware_plan.phase_names(),
        vec!["Bring-up", "Peripheral Enablement"]
    );
    assert_eq!(result.prd.product_brief, DEFAULT_PRODUCT_BRIEF);
    assert_eq!(
        result.summary.notes,
        vec![
            "LLM agent unavailable; using a default firmware plan.".to_string(),
            "Input truncated for: board.kicad_pcb".to_string(),
        ]
    );
    assert_eq!(result.project.pcb_path, Some(uploads.path().join("board.kicad_pcb")));
}

#[tokio::test]
async fn test_planning_without_readable_files() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(out.path(), FakeEngine::new(vec![]), FakePlanner::new(None));

    let result = pipeline
        .run_planning(Some("plan_2"), &[upload("missing.kicad_pro")])
        .await
        .unwrap();

    assert!(result
        .summary
        .notes
        .contains(&"No readable KiCad files were parsed for the LLM.".to_string()));
    assert_eq!(result.files.prd, "plan_2_prd.md");
}
